use ceq::Examples::equilibrium_examples::equilibrium_examples;

pub fn main() {
    //
    let task: usize = 0;
    equilibrium_examples(task);
}
