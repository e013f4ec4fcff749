//! キーヤー全体のエラー型

use thiserror::Error;

/// 音声入力・キー送出・停止処理で発生するエラー
#[derive(Debug, Error)]
pub enum KeyerError {
    /// 名前が一致し、入力チャンネルを持つデバイスがない
    #[error("オーディオデバイスが見つかりません: '{pattern}'\n{available}")]
    DeviceNotFound { pattern: String, available: String },

    /// ストリームを開けない（他のアプリが使用中など）
    #[error("オーディオデバイスを開けません。他のアプリが使用していませんか？: {0}")]
    DeviceUnavailable(String),

    /// ドライバ側でサンプルが欠落した
    #[error("入力バッファがオーバーフローしました ({dropped} フレーム欠落)")]
    Overflow { dropped: u64 },

    #[error("ストリームエラー: {0}")]
    Stream(String),

    #[error("ストリームは既に閉じられています")]
    StreamClosed,

    /// 停止シグナルによる割り込み（異常ではない）
    #[error("停止シグナルを受信しました")]
    Interrupted,

    #[error("不明なキー名: {0}")]
    UnknownKey(String),

    #[error("シグナルハンドラの登録に失敗: {0}")]
    SignalHandler(String),
}

impl KeyerError {
    /// 正常な停止要求かどうか
    pub fn is_interrupt(&self) -> bool {
        matches!(self, KeyerError::Interrupted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interrupt_is_not_failure() {
        assert!(KeyerError::Interrupted.is_interrupt());
        assert!(!KeyerError::StreamClosed.is_interrupt());
        assert!(!KeyerError::Overflow { dropped: 3 }.is_interrupt());
    }

    #[test]
    fn test_error_messages() {
        let err = KeyerError::Overflow { dropped: 3 };
        assert!(err.to_string().contains('3'));

        let err = KeyerError::DeviceNotFound {
            pattern: "USB Audio CODEC".to_string(),
            available: "  - Built-in Microphone".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("USB Audio CODEC"));
        assert!(msg.contains("Built-in Microphone"));
    }
}
