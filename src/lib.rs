//! sidetone-keyer - 無線機のサイドトーンを Ctrl キー入力に変換するキーヤー
//!
//! 無線機の USB オーディオ（マイク側）からサイドトーンを取り込み、
//! 音が出ている間だけ Ctrl キーを押した状態にする。
//! VBand や Vail など、キーボードイベントで打鍵を受け取る
//! Web ベースの CW クライアントをパドルやストレートキーで操作するためのもの。
//!
//! # 主な機能
//!
//! - **デバイス検索**: 名前の一部（例: "USB Audio CODEC"）で入力デバイスを選択
//! - **RMS 検出**: 128 サンプル毎に信号強度を計算
//! - **エッジトリガ**: 閾値をまたいだときだけキーを押す/離す
//! - **確実な解放**: Ctrl+C やエラーで止まっても必ずキーを離す
//!
//! # アーキテクチャ
//!
//! ```text
//! [USB Audio] → [CpalSource] → [rms] → [KeyStateMachine] → [KeyInjector]
//!                    ↑                                          ↓
//!             [ShutdownSignal] ─────→ [Supervisor::cleanup] → key_up
//! ```
//!
//! # 使用例
//!
//! ```no_run
//! use sidetone_keyer::config::Config;
//!
//! // 設定ファイルを読み込み
//! let config = Config::load_or_default("config.toml").unwrap();
//!
//! // またはデフォルト設定を生成
//! Config::write_default("config.toml").unwrap();
//! ```

pub mod audio_input;
pub mod config;
pub mod device;
pub mod error;
pub mod injector;
pub mod keying;
pub mod level;
pub mod shutdown;
pub mod supervisor;
pub mod types;
