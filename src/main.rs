use std::{
    fs::File,
    io::BufWriter,
    time::{Duration, Instant},
};

use anyhow::Context;
use bytes::Bytes;
use avi_writer::{
    AviWriter, Error, Invocation, RecorderConfig, codec::LameFacade, stream::AudioStreamWriter,
};
use tokio_util::sync::CancellationToken;

mod capture;

use capture::{SyntheticScreen, ToneGenerator};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match std::env::args().nth(1) {
        Some(path) => RecorderConfig::from_file(&path).with_context(|| format!("load config {}", path))?,
        None => RecorderConfig::default(),
    };

    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    let mut recording = tokio::task::spawn_blocking(move || record(config, cancel_clone));

    tokio::select! {
        result = &mut recording => return result?,
        _ = tokio::signal::ctrl_c() => {
            log::info!("interrupted, finishing the recording");
            cancel.cancel();
        },
    }
    recording.await?
}

/// No LAME binding is linked into the recorder; MP3 needs a facade from the host.
fn load_lame(library: &str) -> anyhow::Result<Box<dyn LameFacade>> {
    anyhow::bail!("no LAME binding available for {}", library)
}

fn record(config: RecorderConfig, cancel: CancellationToken) -> anyhow::Result<()> {
    let file = File::create(&config.output)
        .with_context(|| format!("create {}", config.output.display()))?;
    let mut writer = AviWriter::new(BufWriter::new(file), config.writer.clone())?;

    let video = writer.add_configured_video_stream(&config.video)?;
    writer.set_stream_name(video.info().index, "screen")?;
    let audio = match &config.audio {
        Some(audio) => Some(add_audio_stream(&mut writer, &config, audio)?),
        None => None,
    };

    let screen = SyntheticScreen::new(config.video.width, config.video.height);
    let mut tone = audio
        .as_ref()
        .map(|a| ToneGenerator::new(a.info().sample_rate, a.info().channel_count, 440.0));
    let frame_interval = Duration::from_secs_f64(1.0 / config.writer.frames_per_second);
    let samples_per_frame = audio
        .as_ref()
        .map(|a| (a.info().sample_rate as f64 / config.writer.frames_per_second).round() as usize)
        .unwrap_or(0);
    let deadline = (config.duration_secs > 0)
        .then(|| Instant::now() + Duration::from_secs(config.duration_secs));

    log::info!(
        "recording {}x{} to {}",
        config.video.width,
        config.video.height,
        config.output.display()
    );
    let mut pending: Option<Invocation> = None;
    let mut pending_audio: Option<Invocation> = None;
    let mut frame_index = 0u64;
    let mut next_tick = Instant::now();
    while !cancel.is_cancelled() && deadline.map_or(true, |d| Instant::now() < d) {
        let frame = screen.capture(frame_index);
        // one frame in flight: the previous one must be stored before the next is queued
        if let Some(previous) = pending.take() {
            previous.wait()?;
        }
        if video.supports_async_writes() {
            pending = Some(video.write_frame_bytes_async(true, frame)?);
        } else {
            video.write_frame(true, &frame, 0, frame.len())?;
        }

        if let (Some(audio), Some(tone)) = (&audio, tone.as_mut()) {
            submit_audio_block(audio, &mut pending_audio, tone.next_block(samples_per_frame))?;
        }

        frame_index += 1;
        next_tick += frame_interval;
        let now = Instant::now();
        if next_tick > now {
            std::thread::sleep(next_tick - now);
        }
    }
    for previous in [pending.take(), pending_audio.take()].into_iter().flatten() {
        previous.wait()?;
    }

    let target = writer.close()?;
    target
        .into_inner()
        .map_err(|e| e.into_error())
        .context("flush recording")?;
    log::info!("recorded {} frames to {}", frame_index, config.output.display());
    Ok(())
}

/// Queues `block` once the previous block of the track is stored, so a failed
/// write stops the recording at the next submission.
fn submit_audio_block(
    audio: &AudioStreamWriter,
    pending: &mut Option<Invocation>,
    block: Bytes,
) -> avi_writer::Result<()> {
    if let Some(previous) = pending.take() {
        previous.wait()?;
    }
    if audio.supports_async_writes() {
        *pending = Some(audio.write_block_bytes_async(block)?);
    } else {
        audio.write_block(&block, 0, block.len())?;
    }
    Ok(())
}

fn add_audio_stream(
    writer: &mut AviWriter<BufWriter<File>>,
    config: &RecorderConfig,
    audio: &avi_writer::config::AudioStreamConfig,
) -> anyhow::Result<std::sync::Arc<AudioStreamWriter>> {
    let stream = match writer.add_mp3_lame_audio_stream(
        audio.channel_count,
        audio.sample_rate,
        audio.output_bit_rate,
        &config.libraries,
        load_lame,
    ) {
        Ok(stream) => stream,
        Err(Error::Encoder(e)) => {
            log::warn!("MP3 encoder unavailable ({:#}), recording PCM", e);
            writer.add_audio_stream(audio.channel_count, audio.sample_rate, 16, true)?
        }
        Err(e) => return Err(e.into()),
    };
    writer.set_stream_name(stream.info().index, "audio")?;
    Ok(stream)
}
