use crate::modules::common::signal::SIGNAL_MANAGER;
use crate::modules::scheduler::model::JobMeta;
use crate::modules::scheduler::processor::Package;
use crate::modules::scheduler::store::TaskStore;
use crate::modules::scheduler::{handlers, processor::TaskProcessor, updater::TaskStatusUpdater};
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

pub struct TaskFlow<T>
where
    T: TaskStore + Send + Sync + Clone + 'static,
{
    task_store: Arc<T>,
    processors: Arc<DashMap<String, TaskProcessor>>,
}

impl<T> TaskFlow<T>
where
    T: TaskStore + Send + Sync + Clone + 'static,
{
    pub fn new(
        task_store: Arc<T>,
        queue_concurrency: &DashMap<String, usize>,
        handlers: Arc<handlers::TaskHandlers>,
        status_updater: Arc<TaskStatusUpdater>,
    ) -> Self {
        let processors = DashMap::new();
        //create processor for each queue
        for entry in queue_concurrency.iter() {
            let queue = entry.key().to_string();
            let processor = TaskProcessor::new(
                queue.clone(),
                *entry.value(),
                handlers.clone(),
                status_updater.clone(),
            );
            processors.insert(queue, processor);
        }

        Self {
            task_store,
            processors: Arc::new(processors),
        }
    }

    pub async fn start(self: Arc<Self>) {
        let task_store = self.task_store.clone();
        let processors = self.processors.clone();
        let mut shutdown = SIGNAL_MANAGER.subscribe();
        let mut interval = tokio::time::interval(Duration::from_millis(200));
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        match task_store.clone().fetch_pending_tasks().await {
                            Ok(tasks) => {
                                let mut queued_tasks: HashMap<String, Vec<JobMeta>> = HashMap::new();
                                for task in tasks {
                                    queued_tasks
                                        .entry(task.queue_name.clone())
                                        .or_default()
                                        .push(task);
                                }

                                for (queue, tasks) in queued_tasks {
                                    let ordered = Self::order_by_priority(tasks);
                                    if let Err(e) = Self::send_tasks_to_channel(processors.clone(), &queue, ordered).await {
                                        error!(
                                            "Error sending tasks to channel for queue '{}': {:?}",
                                            queue, e
                                        );
                                    }
                                }
                            }
                            Err(e) => {
                                error!("Failed to fetch tasks: {:?}", e);
                            }
                        }
                    }
                    _ = shutdown.recv() => {
                        info!("Stop to fetch pending tasks.");
                        Self::send_poison(processors.clone()).await;
                        break;
                    }

                }
            }
        });
    }

    /// Each family's companion priority stream is a tag on the same queue,
    /// not a separate channel, so a shared concurrency limit still applies.
    /// Priority-tagged jobs drain first; once four have gone out, one normal
    /// job is let through so the normal backlog is never fully starved.
    fn order_by_priority(tasks: Vec<JobMeta>) -> Vec<JobMeta> {
        const PRIORITY_SHARE: usize = 4;
        let (priority, normal): (Vec<JobMeta>, Vec<JobMeta>) =
            tasks.into_iter().partition(|t| t.is_priority);
        if priority.is_empty() || normal.is_empty() {
            let mut all = priority;
            all.extend(normal);
            return all;
        }

        let mut ordered = Vec::with_capacity(priority.len() + normal.len());
        let mut priority = priority.into_iter();
        let mut normal = normal.into_iter();
        loop {
            let mut took_any = false;
            for _ in 0..PRIORITY_SHARE {
                match priority.next() {
                    Some(task) => {
                        ordered.push(task);
                        took_any = true;
                    }
                    None => break,
                }
            }
            if let Some(task) = normal.next() {
                ordered.push(task);
                took_any = true;
            }
            if !took_any {
                break;
            }
        }
        ordered.extend(priority);
        ordered.extend(normal);
        ordered
    }

    async fn send_tasks_to_channel(
        processors: Arc<DashMap<String, TaskProcessor>>,
        queue_name: &str,
        tasks: Vec<JobMeta>,
    ) -> Result<(), String> {
        let processor = processors.get(queue_name).ok_or_else(|| format!(
            "Processor for queue '{}' not found. You may have forgotten to call `.register::<MyTask>()` on the TaskContext instance.",
            queue_name
        ))?;

        for task in tasks {
            processor.accept(Package::task(task)).await;
        }

        Ok(())
    }

    async fn send_poison(processors: Arc<DashMap<String, TaskProcessor>>) {
        for entry in processors.iter() {
            entry.value().accept(Package::PoisonPill).await;
        }
    }
}
