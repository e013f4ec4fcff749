//! 停止シグナル (SIGINT / SIGTERM / Ctrl+C) の処理

use crate::error::KeyerError;
use crossbeam_channel::{Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// 停止要求を伝える共有ハンドル
///
/// 停止要求が来ると割り込み用チャンネルの送信側を破棄する。
/// 受信側は以後ずっと即座に返るので、ブロック中の読み出しを起こせる。
/// 何度要求しても効果は1回目と同じ。
#[derive(Clone)]
pub struct ShutdownSignal {
    requested: Arc<AtomicBool>,
    trigger_tx: Arc<Mutex<Option<Sender<()>>>>,
    interrupt_rx: Receiver<()>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::bounded(1);
        Self {
            requested: Arc::new(AtomicBool::new(false)),
            trigger_tx: Arc::new(Mutex::new(Some(tx))),
            interrupt_rx: rx,
        }
    }

    /// Ctrl+C などのハンドラを登録
    ///
    /// プロセスにつき1回しか登録できない。
    pub fn install_handler(&self) -> Result<(), KeyerError> {
        let signal = self.clone();
        ctrlc::set_handler(move || {
            log::info!("停止シグナルを受信しました...");
            signal.trigger();
        })
        .map_err(|e| KeyerError::SignalHandler(e.to_string()))
    }

    /// 停止を要求する
    pub fn trigger(&self) {
        if self.requested.swap(true, Ordering::SeqCst) {
            return;
        }
        // ロックが汚染されていても送信側だけは確実に捨てる
        let mut guard = match self.trigger_tx.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.take();
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// 停止要求で切断される受信側
    pub fn interrupt_receiver(&self) -> Receiver<()> {
        self.interrupt_rx.clone()
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}
