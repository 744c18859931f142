/// logger initialization for the demo runner and tests
pub mod logger;
