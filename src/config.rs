use crate::injector::parse_key_name;
use crate::types::OverflowPolicy;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub keying: KeyingConfig,
    #[serde(default)]
    pub debug: DebugConfig,
}

/// オーディオ入力設定
///
/// 無線機のUSBオーディオ（マイク側）からの入力に関する設定。
///
/// # デフォルト値
///
/// - `device_name`: "USB Audio CODEC" (IC-7300 などの内蔵USBオーディオ)
/// - `sample_rate`: 44100 Hz
/// - `frame_size`: 128 サンプル
/// - `queue_frames`: 64 フレーム
/// - `overflow_policy`: tolerate
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AudioConfig {
    /// デバイス名に含まれる文字列（大文字小文字を区別）
    ///
    /// Linux (ALSA) では `sysdefault:CARD=CODEC` のような名前になるので
    /// `"CARD=CODEC"` を指定する。実際の名前は `--show-interfaces` で確認できる。
    #[serde(default = "default_device_name")]
    pub device_name: String,
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    #[serde(default = "default_frame_size")]
    pub frame_size: usize,
    /// コールバックと読み出し側の間に溜められるフレーム数
    #[serde(default = "default_queue_frames")]
    pub queue_frames: usize,
    #[serde(default = "default_overflow_policy")]
    pub overflow_policy: OverflowPolicy,
}

/// キー送出の方式
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InjectorBackend {
    /// rdev で OS にキーイベントを送る
    Rdev,
    /// ログ出力のみ（閾値調整用）
    DryRun,
}

/// キーイング設定
///
/// # デフォルト値
///
/// - `rms_threshold`: 50.0
/// - `key`: "ctrl"
/// - `backend`: rdev
///
/// IC-7300 の場合、無音時の RMS は Linux で 1 前後、Windows で 6-10 程度。
/// サウンドカードに合わせて `debug.print_levels` で確認しながら調整する。
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct KeyingConfig {
    /// この値を超える RMS でキー押下とみなす
    #[serde(default = "default_rms_threshold")]
    pub rms_threshold: f64,
    #[serde(default = "default_key")]
    pub key: String,
    #[serde(default = "default_backend")]
    pub backend: InjectorBackend,
}

/// デバッグ出力設定
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DebugConfig {
    /// フレーム毎の RMS を標準出力に表示する
    #[serde(default)]
    pub print_levels: bool,
    /// キー状態の推移を標準出力に表示する
    #[serde(default)]
    pub print_keying: bool,
}

// Default functions
fn default_device_name() -> String {
    "USB Audio CODEC".to_string()
}

fn default_sample_rate() -> u32 {
    44100
}

fn default_frame_size() -> usize {
    128
}

fn default_queue_frames() -> usize {
    64
}

fn default_overflow_policy() -> OverflowPolicy {
    OverflowPolicy::Tolerate
}

fn default_rms_threshold() -> f64 {
    50.0
}

fn default_key() -> String {
    "ctrl".to_string()
}

fn default_backend() -> InjectorBackend {
    InjectorBackend::Rdev
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device_name: default_device_name(),
            sample_rate: default_sample_rate(),
            frame_size: default_frame_size(),
            queue_frames: default_queue_frames(),
            overflow_policy: default_overflow_policy(),
        }
    }
}

impl Default for KeyingConfig {
    fn default() -> Self {
        Self {
            rms_threshold: default_rms_threshold(),
            key: default_key(),
            backend: default_backend(),
        }
    }
}

impl Config {
    /// 設定ファイルから読み込み
    ///
    /// TOML形式の設定ファイルをパースしてConfig構造体を生成する。
    ///
    /// # Errors
    ///
    /// ファイルの読み込みまたはパースに失敗した場合にエラーを返す。
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use sidetone_keyer::config::Config;
    /// let config = Config::from_file("config.toml").unwrap();
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("設定ファイルの読み込みに失敗: {:?}", path.as_ref()))?;
        let config: Config =
            toml::from_str(&content).with_context(|| "設定ファイルのパースに失敗")?;
        Ok(config)
    }

    /// デフォルト設定をファイルに書き出し
    ///
    /// 既存のファイルは上書きされる。
    pub fn write_default<P: AsRef<Path>>(path: P) -> Result<()> {
        let config = Config::default();
        let content =
            toml::to_string_pretty(&config).with_context(|| "設定のシリアライズに失敗")?;
        fs::write(path.as_ref(), content)
            .with_context(|| format!("設定ファイルの書き込みに失敗: {:?}", path.as_ref()))?;
        Ok(())
    }

    /// 設定ファイルがあれば読み込み、なければデフォルトを使用
    ///
    /// # Errors
    ///
    /// ファイルが存在するがパースに失敗した場合にエラーを返す。
    /// ファイルが存在しない場合はエラーにならず、デフォルト設定を返す。
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::from_file(path)
        } else {
            log::warn!(
                "設定ファイルが見つかりません。デフォルト設定を使用します: {:?}",
                path.as_ref()
            );
            Ok(Config::default())
        }
    }

    /// 設定値の妥当性を検査
    pub fn validate(&self) -> Result<()> {
        if self.audio.sample_rate == 0 {
            anyhow::bail!("audio.sample_rate は 1 以上を指定してください");
        }
        if self.audio.frame_size == 0 {
            anyhow::bail!("audio.frame_size は 1 以上を指定してください");
        }
        if self.audio.queue_frames == 0 {
            anyhow::bail!("audio.queue_frames は 1 以上を指定してください");
        }
        if !self.keying.rms_threshold.is_finite() || self.keying.rms_threshold < 0.0 {
            anyhow::bail!(
                "keying.rms_threshold が不正です: {}",
                self.keying.rms_threshold
            );
        }
        parse_key_name(&self.keying.key).context("keying.key が不正です")?;
        Ok(())
    }
}
