use crate::config::AudioConfig;
use crate::error::KeyerError;
use crate::types::{AudioFormat, AudioFrame, OverflowPolicy, SampleI16};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SizedSample};
use crossbeam_channel::{Receiver, Sender, TrySendError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// フレーム単位で音声を読み出す入力源
pub trait FrameSource {
    /// 次のフレームが揃うまでブロックする
    fn read_frame(&mut self) -> Result<AudioFrame, KeyerError>;

    /// ストリームを停止して解放する（何度呼んでもよい）
    fn close(&mut self);
}

/// 無線機のUSBオーディオからの入力
///
/// デバイスが対応するチャンネル数・フォーマットでストリームを開き、
/// コールバック内でモノラル16ビットに変換してから固定長のフレームに区切る。
/// 読み出しは `FrameReceiver` に任せる。
pub struct CpalSource {
    stream: Option<cpal::Stream>,
    receiver: FrameReceiver,
}

impl CpalSource {
    /// 入力ストリームを開く
    ///
    /// # Arguments
    /// * `device_index` - 入力デバイス一覧でのインデックス
    /// * `config` - オーディオ設定
    /// * `interrupt_rx` - 停止要求で切断される受信側（ブロック中の読み出しを起こす）
    ///
    /// # Errors
    ///
    /// デバイスが存在しない・使用中などでストリームを開けない場合は
    /// `KeyerError::DeviceUnavailable` を返す。
    pub fn open(
        device_index: usize,
        config: &AudioConfig,
        interrupt_rx: Receiver<()>,
    ) -> Result<Self, KeyerError> {
        let host = cpal::default_host();

        let device = host
            .input_devices()
            .map_err(|e| KeyerError::DeviceUnavailable(e.to_string()))?
            .nth(device_index)
            .ok_or_else(|| {
                KeyerError::DeviceUnavailable(format!(
                    "インデックス {} のデバイスがありません",
                    device_index
                ))
            })?;

        log::info!("入力デバイス: {:?}", device.name());

        let supported = select_stream_config(&device, config.sample_rate)?;
        let sample_rate = supported.sample_rate().0;
        let channels = supported.channels();

        log::info!(
            "デバイス設定: {:?}, {}Hz, {}ch (モノラルに変換して使用)",
            supported.sample_format(),
            sample_rate,
            channels
        );

        let stream_config = cpal::StreamConfig {
            channels,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let format = AudioFormat {
            sample_rate,
            channels: 1,
        };
        let (sender, receiver) = FrameReceiver::new(
            format,
            config.overflow_policy,
            config.queue_frames,
            interrupt_rx,
        );

        let frame_size = config.frame_size;
        let source_channels = channels as usize;
        let stream = match supported.sample_format() {
            cpal::SampleFormat::F32 => {
                build_stream::<f32>(&device, &stream_config, sender, frame_size, source_channels)?
            }
            cpal::SampleFormat::I16 => {
                build_stream::<i16>(&device, &stream_config, sender, frame_size, source_channels)?
            }
            cpal::SampleFormat::U16 => {
                build_stream::<u16>(&device, &stream_config, sender, frame_size, source_channels)?
            }
            cpal::SampleFormat::I32 => {
                build_stream::<i32>(&device, &stream_config, sender, frame_size, source_channels)?
            }
            format => {
                return Err(KeyerError::DeviceUnavailable(format!(
                    "サポートされていないサンプルフォーマット: {:?}",
                    format
                )))
            }
        };

        stream.play().map_err(|e| {
            KeyerError::DeviceUnavailable(format!("ストリームの再生開始に失敗: {}", e))
        })?;

        log::info!(
            "音声入力ストリームを開始しました ({}Hz, {} サンプル/フレーム)",
            sample_rate,
            frame_size
        );

        Ok(Self {
            stream: Some(stream),
            receiver,
        })
    }
}

impl FrameSource for CpalSource {
    fn read_frame(&mut self) -> Result<AudioFrame, KeyerError> {
        self.receiver.read_frame()
    }

    fn close(&mut self) {
        self.receiver.close();
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                log::warn!("ストリームの一時停止に失敗: {}", e);
            }
            drop(stream);
            log::info!("音声入力ストリームを停止しました");
        }
    }
}

impl Drop for CpalSource {
    fn drop(&mut self) {
        self.close();
    }
}

/// コールバック側が持つ送信側
///
/// フレームの受け渡し、欠落数の記録、致命的エラーの通知を行う。
pub struct FrameSender {
    frame_tx: Sender<Vec<SampleI16>>,
    error_tx: Sender<String>,
    dropped: Arc<AtomicU64>,
}

impl FrameSender {
    /// フレームを渡す。キューが満杯なら捨てて欠落数を数える
    pub fn send_frame(&self, frame: Vec<SampleI16>) {
        match self.frame_tx.try_send(frame) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::SeqCst);
            }
            Err(TrySendError::Disconnected(_)) => {}
        }
    }

    /// 続行できないエラーを読み出し側に伝える
    pub fn report_fatal(&self, reason: String) {
        let _ = self.error_tx.try_send(reason);
    }

    /// cpal のストリームエラーを振り分ける
    ///
    /// デバイスが消えた場合のみ致命的。バックエンド固有のエラーは
    /// ドライバ側で復帰して動作を続けるので警告だけにする。
    pub fn handle_stream_error(&self, err: cpal::StreamError) {
        match err {
            cpal::StreamError::DeviceNotAvailable => {
                log::error!("ストリームエラー: {}", err);
                self.report_fatal(err.to_string());
            }
            cpal::StreamError::BackendSpecific { err } => {
                log::warn!("ストリームで回復可能なエラー: {}", err);
            }
        }
    }
}

/// 読み出し側
///
/// フレーム・ストリームエラー・停止要求のうち最初に来たものを返す。
/// デバイスなしで組み立てられる。
pub struct FrameReceiver {
    format: AudioFormat,
    overflow_policy: OverflowPolicy,
    frame_rx: Receiver<Vec<SampleI16>>,
    error_rx: Receiver<String>,
    interrupt_rx: Receiver<()>,
    /// キューが満杯で捨てたフレーム数
    dropped: Arc<AtomicU64>,
    closed: bool,
}

impl FrameReceiver {
    pub fn new(
        format: AudioFormat,
        overflow_policy: OverflowPolicy,
        queue_frames: usize,
        interrupt_rx: Receiver<()>,
    ) -> (FrameSender, Self) {
        let (frame_tx, frame_rx) = crossbeam_channel::bounded(queue_frames);
        let (error_tx, error_rx) = crossbeam_channel::bounded(4);
        let dropped = Arc::new(AtomicU64::new(0));

        let sender = FrameSender {
            frame_tx,
            error_tx,
            dropped: dropped.clone(),
        };
        let receiver = Self {
            format,
            overflow_policy,
            frame_rx,
            error_rx,
            interrupt_rx,
            dropped,
            closed: false,
        };
        (sender, receiver)
    }
}

impl FrameSource for FrameReceiver {
    fn read_frame(&mut self) -> Result<AudioFrame, KeyerError> {
        if self.closed {
            return Err(KeyerError::StreamClosed);
        }

        let samples = crossbeam_channel::select! {
            recv(self.frame_rx) -> msg => msg.map_err(|_| KeyerError::StreamClosed)?,
            recv(self.error_rx) -> msg => {
                let reason = msg.unwrap_or_else(|_| "ストリームが切断されました".to_string());
                return Err(KeyerError::Stream(reason));
            }
            recv(self.interrupt_rx) -> _ => return Err(KeyerError::Interrupted),
        };

        let dropped = self.dropped.swap(0, Ordering::SeqCst);
        apply_overflow_policy(self.overflow_policy, dropped)?;

        Ok(AudioFrame {
            samples,
            format: self.format,
        })
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

/// オーバーフロー時のポリシーを適用
///
/// `Tolerate` なら警告のみ、`Fail` ならエラーを返す。
fn apply_overflow_policy(policy: OverflowPolicy, dropped: u64) -> Result<(), KeyerError> {
    if dropped == 0 {
        return Ok(());
    }
    match policy {
        OverflowPolicy::Tolerate => {
            log::warn!("入力バッファが溢れました: {} フレーム欠落", dropped);
            Ok(())
        }
        OverflowPolicy::Fail => Err(KeyerError::Overflow { dropped }),
    }
}

fn is_handled_format(format: cpal::SampleFormat) -> bool {
    matches!(
        format,
        cpal::SampleFormat::F32
            | cpal::SampleFormat::I16
            | cpal::SampleFormat::U16
            | cpal::SampleFormat::I32
    )
}

/// デバイスが受け付けるストリーム設定を選ぶ
///
/// 指定サンプルレートに対応する設定のうち、デフォルトと同じフォーマットで
/// チャンネル数の少ないものを優先する。対応するものがなければ
/// デバイスのデフォルト設定をそのまま使う。
fn select_stream_config(
    device: &cpal::Device,
    sample_rate: u32,
) -> Result<cpal::SupportedStreamConfig, KeyerError> {
    let default_config = device
        .default_input_config()
        .map_err(|e| KeyerError::DeviceUnavailable(e.to_string()))?;

    let wanted = cpal::SampleRate(sample_rate);
    let matching = device
        .supported_input_configs()
        .map_err(|e| KeyerError::DeviceUnavailable(e.to_string()))?
        .filter(|range| is_handled_format(range.sample_format()))
        .filter(|range| range.min_sample_rate() <= wanted && wanted <= range.max_sample_rate())
        .min_by_key(|range| {
            (
                range.sample_format() != default_config.sample_format(),
                range.channels(),
            )
        });

    match matching {
        Some(range) => Ok(range.with_sample_rate(wanted)),
        None => {
            log::warn!(
                "{}Hz に対応していないため、デバイスの既定値 {}Hz を使用します",
                sample_rate,
                default_config.sample_rate().0
            );
            Ok(default_config)
        }
    }
}

/// インターリーブされたサンプルを i16 のモノラルに変換
///
/// 各チャンネルの平均を取る。
fn mono_samples<T>(data: &[T], channels: usize) -> impl Iterator<Item = SampleI16> + '_
where
    T: Sample,
    SampleI16: FromSample<T>,
{
    let channels = channels.max(1);
    data.chunks(channels).map(|frame| {
        let sum: i32 = frame
            .iter()
            .map(|&s| s.to_sample::<SampleI16>() as i32)
            .sum();
        (sum / frame.len() as i32) as SampleI16
    })
}

/// コールバックごとに長さの違うサンプル列を固定長フレームに区切る
struct FrameAssembler {
    frame_size: usize,
    pending: Vec<SampleI16>,
}

impl FrameAssembler {
    fn new(frame_size: usize) -> Self {
        Self {
            frame_size,
            pending: Vec::with_capacity(frame_size),
        }
    }

    /// サンプルを追加し、揃ったフレームを `emit` に渡す
    fn push<I, F>(&mut self, samples: I, mut emit: F)
    where
        I: IntoIterator<Item = SampleI16>,
        F: FnMut(Vec<SampleI16>),
    {
        for sample in samples {
            self.pending.push(sample);
            if self.pending.len() == self.frame_size {
                let frame = std::mem::replace(
                    &mut self.pending,
                    Vec::with_capacity(self.frame_size),
                );
                emit(frame);
            }
        }
    }
}

/// ストリームを構築
///
/// デバイスのネイティブフォーマットで受け取り、モノラルの i16 に変換する。
fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sender: FrameSender,
    frame_size: usize,
    source_channels: usize,
) -> Result<cpal::Stream, KeyerError>
where
    T: SizedSample + Send + 'static,
    SampleI16: FromSample<T>,
{
    let sender = Arc::new(sender);
    let error_sender = sender.clone();
    let mut assembler = FrameAssembler::new(frame_size);

    let data_callback = move |data: &[T], _info: &cpal::InputCallbackInfo| {
        assembler.push(mono_samples(data, source_channels), |frame| {
            sender.send_frame(frame);
        });
    };

    let error_callback = move |err: cpal::StreamError| {
        error_sender.handle_stream_error(err);
    };

    device
        .build_input_stream(config, data_callback, error_callback, None)
        .map_err(|e| KeyerError::DeviceUnavailable(format!("入力ストリームの構築に失敗: {}", e)))
}
