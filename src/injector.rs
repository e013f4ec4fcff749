//! OS へのキー入力送出
//!
//! Web ブラウザ上の CW クライアント (VBand, Vail など) は keydown/keyup を
//! 見ているので、サイドトーンに合わせて修飾キーを押したり離したりする。
//! 送出は投げっぱなしで、失敗してもログに残すだけ。

use crate::config::{InjectorBackend, KeyingConfig};
use crate::error::KeyerError;
use rdev::{EventType, Key};
use std::time::Duration;

/// キー入力を送出する機能
pub trait KeyInjector {
    fn key_down(&mut self);

    fn key_up(&mut self);

    /// 送出後の待ち時間を無くす（起動時に1回呼ぶ）
    ///
    /// 待ち時間があるとキーイングのタイミングがずれる。
    fn disable_delay(&mut self) {}

    /// ログ用の名前
    fn name(&self) -> &'static str;
}

/// rdev 経由でキーイベントを送出する
///
/// rdev がプラットフォーム毎の仕組み (X11 XTest, macOS CGEvent,
/// Windows SendInput) を選ぶ。Wayland 単体では動作しない。
pub struct RdevInjector {
    key: Key,
    /// 送出後に待つ時間
    settle_delay: Duration,
}

impl RdevInjector {
    /// rdev のドキュメントが推奨する送出間隔
    const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(20);

    pub fn new(key: Key) -> Self {
        Self {
            key,
            settle_delay: Self::DEFAULT_SETTLE_DELAY,
        }
    }

    fn send(&self, event: EventType) {
        if let Err(e) = rdev::simulate(&event) {
            log::warn!("キーイベントの送出に失敗: {:?} ({:?})", event, e);
        }
        if !self.settle_delay.is_zero() {
            std::thread::sleep(self.settle_delay);
        }
    }
}

impl KeyInjector for RdevInjector {
    fn key_down(&mut self) {
        self.send(EventType::KeyPress(self.key));
    }

    fn key_up(&mut self) {
        self.send(EventType::KeyRelease(self.key));
    }

    fn disable_delay(&mut self) {
        self.settle_delay = Duration::ZERO;
    }

    fn name(&self) -> &'static str {
        "rdev"
    }
}

/// キーを送出せずログに出すだけ
///
/// 閾値の調整中など、実際にキーを押したくないときに使う。
#[derive(Default)]
pub struct DryRunInjector {
    presses: u64,
}

impl KeyInjector for DryRunInjector {
    fn key_down(&mut self) {
        self.presses += 1;
        log::info!("[dry-run] key down (#{})", self.presses);
    }

    fn key_up(&mut self) {
        log::info!("[dry-run] key up");
    }

    fn name(&self) -> &'static str {
        "dry-run"
    }
}

/// 設定に応じた送出方式を作成
pub fn create_injector(config: &KeyingConfig) -> Result<Box<dyn KeyInjector>, KeyerError> {
    let key = parse_key_name(&config.key)?;

    let injector: Box<dyn KeyInjector> = match config.backend {
        InjectorBackend::Rdev => Box::new(RdevInjector::new(key)),
        InjectorBackend::DryRun => Box::new(DryRunInjector::default()),
    };

    log::info!(
        "キー送出: {} (キー: {})",
        injector.name(),
        config.key
    );

    Ok(injector)
}

/// キー名を rdev の Key に変換
///
/// 大文字小文字は区別しない。
pub fn parse_key_name(name: &str) -> Result<Key, KeyerError> {
    let key = match name.to_ascii_lowercase().replace('-', "_").as_str() {
        "ctrl" | "control" | "left_ctrl" | "left_control" => Key::ControlLeft,
        "right_ctrl" | "right_control" => Key::ControlRight,
        "alt" | "left_alt" => Key::Alt,
        "shift" | "left_shift" => Key::ShiftLeft,
        "right_shift" => Key::ShiftRight,
        "space" => Key::Space,
        "meta" | "super" | "cmd" | "command" => Key::MetaLeft,
        _ => return Err(KeyerError::UnknownKey(name.to_string())),
    };
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_name() {
        assert_eq!(parse_key_name("ctrl").unwrap(), Key::ControlLeft);
        assert_eq!(parse_key_name("CTRL").unwrap(), Key::ControlLeft);
        assert_eq!(parse_key_name("left-ctrl").unwrap(), Key::ControlLeft);
        assert_eq!(parse_key_name("right_ctrl").unwrap(), Key::ControlRight);
        assert_eq!(parse_key_name("Space").unwrap(), Key::Space);
        assert_eq!(parse_key_name("right_shift").unwrap(), Key::ShiftRight);
    }

    #[test]
    fn test_parse_unknown_key() {
        let err = parse_key_name("hyper").unwrap_err();
        assert!(matches!(err, KeyerError::UnknownKey(ref k) if k == "hyper"));
    }

    #[test]
    fn test_disable_delay() {
        let mut injector = RdevInjector::new(Key::ControlLeft);
        assert_eq!(injector.settle_delay, RdevInjector::DEFAULT_SETTLE_DELAY);

        injector.disable_delay();
        assert!(injector.settle_delay.is_zero());
    }

    #[test]
    fn test_create_injector() {
        let config = KeyingConfig {
            backend: InjectorBackend::DryRun,
            ..KeyingConfig::default()
        };
        let injector = create_injector(&config).unwrap();
        assert_eq!(injector.name(), "dry-run");

        let config = KeyingConfig::default();
        let injector = create_injector(&config).unwrap();
        assert_eq!(injector.name(), "rdev");

        let config = KeyingConfig {
            key: "nope".to_string(),
            ..KeyingConfig::default()
        };
        assert!(create_injector(&config).is_err());
    }

    #[test]
    fn test_dry_run_counts_presses() {
        let mut injector = DryRunInjector::default();
        injector.key_down();
        injector.key_up();
        injector.key_down();
        assert_eq!(injector.presses, 2);
    }
}
