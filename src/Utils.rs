//! different utility modules used throughout the project
/// csv readers and writers for training tables, bounds, parameter vectors and fit history
pub mod logger;
/// parse documents like "title1 key1: value1, value2 key2: value2 title2 key3: value3"
/// into a HashMap and map them onto solver settings
pub mod task_parser;
/// tic/tac timers of the fit phases
pub mod timer;
