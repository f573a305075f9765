use std::future::Future;
use std::pin::Pin;

use tokio::task::JoinHandle;
use tracing::info;

type BoxedTask = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Collects background loops and spawns them together.
#[derive(Default)]
pub struct TaskRunner {
    tasks: Vec<(&'static str, BoxedTask)>,
}

impl TaskRunner {
    pub fn new() -> Self {
        Self { tasks: Vec::new() }
    }

    pub fn add_task<F>(&mut self, name: &'static str, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tasks.push((name, Box::pin(task)));
    }

    pub fn start_all(self) -> Vec<JoinHandle<()>> {
        self.tasks
            .into_iter()
            .map(|(name, task)| {
                info!(task = name, "starting background task");
                tokio::spawn(task)
            })
            .collect()
    }
}
