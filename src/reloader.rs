//! 后台定时 reload
//!
//! 单独的线程按固定间隔触发 reload，周期之间不会重叠：上一个周期耗时过长只会推迟下一个 tick。
//! 句柄 drop 时发送停止信号并等待线程退出，正在执行的周期会完整结束。

use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel;

/// 后台 reload 线程句柄（内部使用）
pub(crate) struct ReloadHandle {
    stop_sender: Option<channel::Sender<()>>,
    thread_handle: Option<JoinHandle<()>>,
}

impl ReloadHandle {
    /// 启动后台线程，每个 `interval` 调用一次 `tick`
    pub(crate) fn spawn<F>(interval: Duration, tick: F) -> std::io::Result<Self>
    where
        F: Fn() + Send + 'static,
    {
        let (stop_tx, stop_rx) = channel::bounded::<()>(1);
        let ticker = channel::tick(interval);

        let thread_handle = thread::Builder::new()
            .name("livecfg-reloader".to_string())
            .spawn(move || loop {
                crossbeam::select! {
                    recv(stop_rx) -> _ => break,
                    recv(ticker) -> _ => {
                        // tick 期间积压的信号直接丢弃
                        while ticker.try_recv().is_ok() {}
                        tick();
                    }
                }
            })?;

        Ok(Self {
            stop_sender: Some(stop_tx),
            thread_handle: Some(thread_handle),
        })
    }

    /// 停止并等待线程退出
    pub(crate) fn stop(&mut self) {
        if let Some(sender) = self.stop_sender.take() {
            let _ = sender.send(());
        }
        if let Some(handle) = self.thread_handle.take() {
            if handle.thread().id() == thread::current().id() {
                // 在 reload 线程内部关闭，不能 join 自己
                return;
            }
            let _ = handle.join();
        }
    }
}

impl Drop for ReloadHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
