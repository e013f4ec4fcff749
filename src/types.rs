use serde::{Deserialize, Serialize};

/// 16ビット整数型のオーディオサンプル
///
/// PCM形式の音声データを表現するための型エイリアス。
/// -32768 から 32767 の範囲の値を取る。
pub type SampleI16 = i16;

/// 1フレーム分の信号強度 (RMS)
///
/// 16ビットサンプルの生の値で表す（正規化しない）。
/// 常に 0 以上。
pub type SignalLevel = f64;

/// オーディオフォーマット情報
///
/// 音声データのサンプリングレートとチャンネル数を保持する。
///
/// # Examples
///
/// ```
/// # use sidetone_keyer::types::AudioFormat;
/// let format = AudioFormat {
///     sample_rate: 44100,
///     channels: 1,
/// };
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AudioFormat {
    /// サンプリングレート (Hz)
    pub sample_rate: u32,

    /// チャンネル数 (常に 1: モノラル)
    pub channels: u16,
}

/// オーディオフレーム
///
/// 入力ストリームから読み出した固定長のサンプル列。
/// LevelDetector からは読み取り専用で扱われ、ループ1周で破棄される。
///
/// # Examples
///
/// ```
/// # use sidetone_keyer::types::{AudioFrame, AudioFormat};
/// let frame = AudioFrame {
///     samples: vec![0i16; 128],
///     format: AudioFormat { sample_rate: 44100, channels: 1 },
/// };
/// assert_eq!(frame.len(), 128);
/// ```
#[derive(Clone, Debug)]
pub struct AudioFrame {
    /// PCM音声サンプルの配列
    pub samples: Vec<SampleI16>,

    /// オーディオフォーマット情報
    pub format: AudioFormat,
}

impl AudioFrame {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// 入力デバイスの情報
///
/// デバイス一覧の1エントリ。`index` はホストの入力デバイス列挙順。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceInfo {
    pub index: usize,
    pub name: String,
    /// 最大入力チャンネル数（0 なら入力に使えない）
    pub max_input_channels: u16,
}

/// キーの状態
///
/// サイドトーンが聞こえている間は `Pressed`。
/// パドルからの打鍵でもストレートキーを押しているのと同じ扱いになる。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum KeyState {
    /// キーを離している（初期状態）
    #[default]
    Released,

    /// キーを押している
    Pressed,
}

/// 状態遷移時に発行されるキーイベント
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyEvent {
    /// 閾値を上回った（押下開始）
    KeyDown,

    /// 閾値以下に戻った（押下終了）
    KeyUp,
}

impl std::fmt::Display for KeyEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyEvent::KeyDown => write!(f, "KEY_DOWN"),
            KeyEvent::KeyUp => write!(f, "KEY_UP"),
        }
    }
}

/// 入力バッファのオーバーフロー時の扱い
///
/// # Examples
///
/// ```
/// # use sidetone_keyer::types::OverflowPolicy;
/// let policy = OverflowPolicy::Tolerate; // 欠損を警告して処理を続ける
/// ```
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// 警告を出して次のフレームから処理を続ける
    Tolerate,

    /// 致命的エラーとして停止処理に入る
    Fail,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_frame_creation() {
        let frame = AudioFrame {
            samples: vec![0i16; 128],
            format: AudioFormat {
                sample_rate: 44100,
                channels: 1,
            },
        };
        assert_eq!(frame.len(), 128);
        assert!(!frame.is_empty());
        assert_eq!(frame.format.sample_rate, 44100);
    }

    #[test]
    fn test_key_state_default_is_released() {
        assert_eq!(KeyState::default(), KeyState::Released);
    }

    #[test]
    fn test_overflow_policy_serialization() {
        let policy = OverflowPolicy::Tolerate;
        let json = serde_json::to_string(&policy).unwrap();
        assert_eq!(json, r#""tolerate""#);

        let deserialized: OverflowPolicy = serde_json::from_str(r#""fail""#).unwrap();
        assert_eq!(deserialized, OverflowPolicy::Fail);
    }

    #[test]
    fn test_key_event_display() {
        assert_eq!(KeyEvent::KeyDown.to_string(), "KEY_DOWN");
        assert_eq!(KeyEvent::KeyUp.to_string(), "KEY_UP");
    }
}
