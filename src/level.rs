use crate::types::{SampleI16, SignalLevel};

/// RMS (Root Mean Square) を計算
///
/// 16ビットサンプルの二乗平均平方根を生の値のまま返す（正規化しない）。
/// 二乗の累積は f64 で行うため、フレーム長によるオーバーフローはない。
/// 空の配列は 0 を返す。
///
/// # Examples
///
/// ```
/// # use sidetone_keyer::level::rms;
/// assert_eq!(rms(&[0i16; 128]), 0.0);
/// assert_eq!(rms(&[100i16, -100, 100, -100]), 100.0);
/// ```
pub fn rms(samples: &[SampleI16]) -> SignalLevel {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_of_squares: f64 = samples
        .iter()
        .map(|&s| {
            let s = s as f64;
            s * s
        })
        .sum();

    (sum_of_squares / samples.len() as f64).sqrt()
}

/// RMSをフルスケール基準のデシベル (dBFS) に変換
///
/// 閾値調整時の表示用。無音は -100 dBFS とする。
pub fn rms_to_dbfs(level: SignalLevel) -> f64 {
    if level <= 0.0 {
        return -100.0;
    }
    20.0 * (level / i16::MAX as f64).log10()
}
