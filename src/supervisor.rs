use crate::audio_input::{CpalSource, FrameSource};
use crate::config::Config;
use crate::device::{find_input_device, list_input_devices, not_found_error};
use crate::error::KeyerError;
use crate::injector::KeyInjector;
use crate::keying::{keying_mark, KeyStateMachine};
use crate::level::{rms, rms_to_dbfs};
use crate::shutdown::ShutdownSignal;
use crate::types::{AudioFrame, KeyEvent, KeyState};
use std::io::Write;

/// デバイス検索から後片付けまでを受け持つ
///
/// フレームの読み出し → RMS 計算 → 状態遷移 → キー送出 を1スレッドで繰り返す。
/// 停止シグナルでも致命的エラーでも、最後は必ず `cleanup` を1回だけ通る。
pub struct Supervisor {
    config: Config,
    injector: Box<dyn KeyInjector>,
    machine: KeyStateMachine,
    shutdown: ShutdownSignal,
    /// ストリームを開いた後なら立つ
    stream_opened: bool,
    cleaned_up: bool,
}

impl Supervisor {
    pub fn new(config: Config, injector: Box<dyn KeyInjector>, shutdown: ShutdownSignal) -> Self {
        let machine = KeyStateMachine::new(config.keying.rms_threshold);
        Self {
            config,
            injector,
            machine,
            shutdown,
            stream_opened: false,
            cleaned_up: false,
        }
    }

    /// デバイスを開いてメインループを実行
    ///
    /// # Errors
    ///
    /// - `DeviceNotFound`: 対象デバイスがない（何も開いていないので後片付け不要）
    /// - `DeviceUnavailable`: ストリームを開けない（後片付けをしてから返す）
    /// - その他の致命的エラー（後片付け済み）
    ///
    /// 停止シグナルによる終了は `Ok(())`。
    pub fn start(&mut self) -> Result<(), KeyerError> {
        self.injector.disable_delay();

        let devices = list_input_devices()?;
        let pattern = self.config.audio.device_name.as_str();
        let Some(index) = find_input_device(&devices, pattern) else {
            return Err(not_found_error(&devices, pattern));
        };

        let mut source = match CpalSource::open(
            index,
            &self.config.audio,
            self.shutdown.interrupt_receiver(),
        ) {
            Ok(source) => {
                self.stream_opened = true;
                source
            }
            Err(e) => {
                self.cleanup(None);
                return Err(e);
            }
        };

        if let Err(e) = self.shutdown.install_handler() {
            self.cleanup(Some(&mut source as &mut dyn FrameSource));
            return Err(e);
        }

        println!();
        println!("Listening; switch to VBand/Vail tab now (Ctrl-C to quit)");

        self.run(&mut source)
    }

    /// 停止するまでフレームを処理し、後片付けをして返る
    ///
    /// 停止要求が出ていれば、ループを抜けた理由が何であれ割り込みとして扱う。
    pub fn run(&mut self, source: &mut dyn FrameSource) -> Result<(), KeyerError> {
        self.stream_opened = true;

        let mut reason = self.pump(source);
        if self.shutdown.is_requested() && !reason.is_interrupt() {
            log::debug!("停止要求中のエラーを無視します: {}", reason);
            reason = KeyerError::Interrupted;
        }

        if reason.is_interrupt() {
            log::info!("停止処理を開始します...");
        } else {
            log::warn!("エラーのため停止処理を開始します: {}", reason);
        }

        self.cleanup(Some(source));

        if reason.is_interrupt() {
            Ok(())
        } else {
            Err(reason)
        }
    }

    /// 停止理由が出るまでループする
    fn pump(&mut self, source: &mut dyn FrameSource) -> KeyerError {
        loop {
            if self.shutdown.is_requested() {
                return KeyerError::Interrupted;
            }
            match source.read_frame() {
                Ok(frame) => {
                    self.process_frame(&frame);
                }
                Err(e) => return e,
            }
        }
    }

    /// 1フレームを評価し、状態が変わればキーを送出する
    pub fn process_frame(&mut self, frame: &AudioFrame) -> Option<KeyEvent> {
        let level = rms(&frame.samples);
        if self.config.debug.print_levels {
            println!("{:.0} ({:.1} dBFS)", level, rms_to_dbfs(level));
        }

        let event = self.machine.update(level);
        match event {
            Some(KeyEvent::KeyDown) => self.injector.key_down(),
            Some(KeyEvent::KeyUp) => self.injector.key_up(),
            None => {}
        }

        if self.config.debug.print_keying {
            print_keying_mark(keying_mark(event, self.machine.state()));
        }

        event
    }

    /// ストリームを止め、キーを必ず離す
    ///
    /// 何度呼んでも結果は1回目と同じ。キーの解放は最初の1回だけ送る。
    /// 順序は ストリーム停止 → キー解放。
    pub fn cleanup(&mut self, source: Option<&mut dyn FrameSource>) {
        if let Some(source) = source {
            source.close();
        }

        if self.cleaned_up {
            return;
        }
        self.cleaned_up = true;

        log::info!("リソースを解放しています...");

        if self.machine.force_release().is_some() {
            log::debug!("押下中のキーを解放します");
        }
        // 状態に関係なく必ず離す
        self.injector.key_up();

        log::info!("終了します");
    }

    pub fn machine(&self) -> &KeyStateMachine {
        &self.machine
    }

    pub fn is_cleaned_up(&self) -> bool {
        self.cleaned_up
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        // デバイスを開く前ならキーに触れていない
        if self.cleaned_up {
            return;
        }
        if self.stream_opened || self.machine.state() == KeyState::Pressed {
            self.cleanup(None);
        }
    }
}

/// キーイングの推移を1文字ずつ表示
///
/// 押下開始の前と押下終了の後で改行する。
fn print_keying_mark(mark: char) {
    let mut stdout = std::io::stdout().lock();
    let _ = match mark {
        '/' => write!(stdout, "\n{}", mark),
        '\\' => writeln!(stdout, "{}", mark),
        _ => write!(stdout, "{}", mark),
    };
    let _ = stdout.flush();
}
