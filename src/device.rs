//! 入力デバイスの列挙と検索

use crate::error::KeyerError;
use crate::types::DeviceInfo;
use cpal::traits::{DeviceTrait, HostTrait};

/// 名前に `pattern` を含み、入力チャンネルを持つ最初のデバイスを探す
///
/// 大文字小文字は区別する。同名のデバイスが複数あっても最初の1つを返す。
///
/// # Returns
/// * `Some(index)` - 見つかったデバイスのインデックス
/// * `None` - 見つからない（設定を見直してもらう通常のケース）
pub fn find_input_device(devices: &[DeviceInfo], pattern: &str) -> Option<usize> {
    log::info!("'{}' を含むオーディオデバイスを探しています...", pattern);

    for device in devices {
        log::debug!(
            "  [{}] {} (入力 {}ch)",
            device.index,
            device.name,
            device.max_input_channels
        );
        // 入力チャンネルのないデバイスはスピーカー側なので対象外
        if device.name.contains(pattern) && device.max_input_channels > 0 {
            log::info!(
                "使用するオーディオデバイス: [{}] {} (入力 {}ch)",
                device.index,
                device.name,
                device.max_input_channels
            );
            return Some(device.index);
        }
    }

    None
}

/// `DeviceNotFound` エラーを組み立てる
///
/// 利用可能なデバイス名の一覧をメッセージに含める。
pub fn not_found_error(devices: &[DeviceInfo], pattern: &str) -> KeyerError {
    let available = if devices.is_empty() {
        "入力デバイスがありません".to_string()
    } else {
        format!(
            "利用可能なデバイス:\n{}",
            devices
                .iter()
                .map(|d| format!("  [{}] {} ({}ch)", d.index, d.name, d.max_input_channels))
                .collect::<Vec<_>>()
                .join("\n")
        )
    };

    KeyerError::DeviceNotFound {
        pattern: pattern.to_string(),
        available,
    }
}

/// デフォルトホストの入力デバイスを列挙
///
/// 最大入力チャンネル数はサポートされている設定の中の最大値。
/// 設定が取得できないデバイスは 0 とする。
pub fn list_input_devices() -> Result<Vec<DeviceInfo>, KeyerError> {
    let host = cpal::default_host();
    let devices = host
        .input_devices()
        .map_err(|e| KeyerError::DeviceUnavailable(e.to_string()))?;

    let infos = devices
        .enumerate()
        .map(|(index, device)| {
            let name = device.name().unwrap_or_else(|_| "(不明なデバイス)".to_string());
            let max_input_channels = device
                .supported_input_configs()
                .map(|configs| configs.map(|c| c.channels()).max().unwrap_or(0))
                .unwrap_or(0);
            DeviceInfo {
                index,
                name,
                max_input_channels,
            }
        })
        .collect();

    Ok(infos)
}

/// デバイス一覧を表示
pub fn print_devices() -> anyhow::Result<()> {
    let host = cpal::default_host();
    println!("利用可能な入力デバイス:");
    println!();

    for (idx, device) in host.input_devices()?.enumerate() {
        let name = device.name()?;
        println!("  [{}] {}", idx, name);

        device.supported_input_configs()?.for_each(|config_range| {
            println!(
                "      フォーマット: {:?}, {}-{}Hz, {}ch",
                config_range.sample_format(),
                config_range.min_sample_rate().0,
                config_range.max_sample_rate().0,
                config_range.channels()
            );
        });
        println!();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(index: usize, name: &str, max_input_channels: u16) -> DeviceInfo {
        DeviceInfo {
            index,
            name: name.to_string(),
            max_input_channels,
        }
    }

    #[test]
    fn test_find_matching_input() {
        let devices = vec![
            device(0, "Built-in Microphone", 2),
            device(1, "USB Audio CODEC (output)", 0),
            device(2, "USB Audio CODEC", 1),
        ];
        assert_eq!(find_input_device(&devices, "USB Audio CODEC"), Some(2));
    }

    #[test]
    fn test_first_match_wins() {
        let devices = vec![
            device(0, "hw:USB Audio CODEC,0", 2),
            device(1, "USB Audio CODEC", 1),
        ];
        assert_eq!(find_input_device(&devices, "USB Audio CODEC"), Some(0));
    }

    #[test]
    fn test_zero_channel_match_is_not_found() {
        let devices = vec![
            device(0, "USB Audio CODEC", 0),
            device(1, "Built-in Microphone", 2),
        ];
        assert_eq!(find_input_device(&devices, "USB Audio CODEC"), None);
    }

    #[test]
    fn test_alsa_card_name() {
        let devices = vec![
            device(0, "default", 2),
            device(1, "sysdefault:CARD=PCH", 2),
            device(2, "sysdefault:CARD=CODEC", 1),
        ];
        // ALSA の名前には既定の "USB Audio CODEC" が含まれない
        assert_eq!(find_input_device(&devices, "USB Audio CODEC"), None);
        assert_eq!(find_input_device(&devices, "CARD=CODEC"), Some(2));
    }

    #[test]
    fn test_no_matching_name() {
        let devices = vec![device(0, "Built-in Microphone", 2), device(1, "Webcam", 1)];
        assert_eq!(find_input_device(&devices, "USB Audio CODEC"), None);
        assert_eq!(find_input_device(&[], "USB Audio CODEC"), None);
    }

    #[test]
    fn test_match_is_case_sensitive() {
        let devices = vec![device(0, "usb audio codec", 1)];
        assert_eq!(find_input_device(&devices, "USB Audio CODEC"), None);
    }

    #[test]
    fn test_not_found_error_lists_devices() {
        let devices = vec![device(0, "Built-in Microphone", 2)];
        let err = not_found_error(&devices, "USB Audio CODEC");
        assert!(matches!(err, KeyerError::DeviceNotFound { .. }));
        assert!(err.to_string().contains("Built-in Microphone"));

        let err = not_found_error(&[], "USB Audio CODEC");
        assert!(err.to_string().contains("入力デバイスがありません"));
    }
}
