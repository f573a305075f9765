pub mod calendar_loop;
pub mod keep_alive_loop;
pub mod task_runner;
pub mod ticker;
