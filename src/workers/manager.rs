// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::workers::worker::Worker;
use std::sync::Arc;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// 工作管理器
///
/// 为每个队列阶段启动独立的工作器池，各工作器自行拉取任务，
/// 前沿与文档集上没有全局锁。收到关闭信号后中止全部池。
pub struct WorkerManager {
    handles: Vec<JoinHandle<()>>,
}

impl Default for WorkerManager {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerManager {
    pub fn new() -> Self {
        Self {
            handles: Vec::new(),
        }
    }

    /// 启动一组同类工作器
    ///
    /// # 参数
    ///
    /// * `count` - 池大小
    /// * `make_worker` - 工作器构造闭包，每个实例独立
    pub fn start_pool<F>(&mut self, count: usize, make_worker: F)
    where
        F: Fn() -> Arc<dyn Worker>,
    {
        for _ in 0..count {
            let worker = make_worker();
            let handle = tokio::spawn(async move {
                if let Err(e) = worker.run().await {
                    error!("Worker {} exited with error: {}", worker.name(), e);
                }
            });
            self.handles.push(handle);
        }
    }

    /// 等待关闭信号并关闭工作进程
    pub async fn wait_for_shutdown(&mut self) {
        match signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received"),
            Err(err) => error!("Unable to listen for shutdown signal: {}", err),
        }

        info!("Shutting down workers...");
        for handle in &self.handles {
            handle.abort();
        }

        info!("Workers shut down successfully");
    }
}
