use std::{
    future::Future,
    path::{Path, PathBuf},
    process::Stdio,
    sync::Arc,
};

use tokio::{
    io::{AsyncBufReadExt, AsyncReadExt, BufReader},
    process::Command,
    task::JoinSet,
};

use crate::{
    error::{KawaError, KawaResult},
    path::KawaPathExt,
    progress::{ProgressEvent, SharedProgressSink},
};

/// Fixed encoding parameters for one target. Not renegotiated on
/// failure; an encode either completes with these or fails.
#[derive(Debug, Clone)]
pub struct EncodeParams {
    pub video_codec: String,
    /// Constant bitrate in kbit/s, also used as min/max rate.
    pub video_bitrate_k: u32,
    pub audio_codec: String,
    pub audio_channels: u8,
    /// GOP size (`-g`).
    pub keyframe_interval: u32,
    pub min_keyframe_interval: u32,
    pub preset: String,
    /// Output container (`-f`).
    pub container: String,
}

impl EncodeParams {
    /// The delivery profile: constant-bitrate x264 with stereo AAC.
    pub fn x264_cbr(container: &str) -> Self {
        Self {
            video_codec: "libx264".to_string(),
            video_bitrate_k: 6000,
            audio_codec: "aac".to_string(),
            audio_channels: 2,
            keyframe_interval: 120,
            min_keyframe_interval: 30,
            preset: "medium".to_string(),
            container: container.to_string(),
        }
    }
}

/// One transcode target. Jobs share one input and run independently.
#[derive(Debug, Clone)]
pub struct EncodeJob {
    /// Tag carried on every progress event of this job.
    pub format: String,
    pub params: EncodeParams,
    pub output_path: PathBuf,
}

impl EncodeJob {
    pub fn flv(output_dir: &Path, asset_id: &str) -> Self {
        Self {
            format: "FLV".to_string(),
            params: EncodeParams::x264_cbr("flv"),
            output_path: output_dir.join(format!("{asset_id}.flv")),
        }
    }

    pub fn mp4(output_dir: &Path, asset_id: &str) -> Self {
        Self {
            format: "MP4".to_string(),
            params: EncodeParams::x264_cbr("mp4"),
            output_path: output_dir.join(format!("{asset_id}.mp4")),
        }
    }

    pub fn for_extension(ext: &str, output_dir: &Path, asset_id: &str) -> Option<Self> {
        match ext {
            "flv" => Some(Self::flv(output_dir, asset_id)),
            "mp4" => Some(Self::mp4(output_dir, asset_id)),
            _ => None,
        }
    }

    pub fn default_set(output_dir: &Path, asset_id: &str) -> Vec<Self> {
        vec![
            Self::flv(output_dir, asset_id),
            Self::mp4(output_dir, asset_id),
        ]
    }
}

/// External encoding engine. Implementations report fractional
/// completion through the sink, tagged with the job's format.
pub trait Encoder: Send + Sync {
    fn encode(
        &self,
        input: &Path,
        job: &EncodeJob,
        on_progress: SharedProgressSink,
    ) -> impl Future<Output = KawaResult<()>> + Send;
}

/// Runs all encode jobs for one input concurrently.
pub struct TranscodeOrchestrator<E> {
    encoder: Arc<E>,
    progress: SharedProgressSink,
}

impl<E> TranscodeOrchestrator<E>
where
    E: Encoder + Send + Sync + 'static,
{
    pub fn new(encoder: E, progress: SharedProgressSink) -> Self {
        Self {
            encoder: Arc::new(encoder),
            progress,
        }
    }

    /// Launches every job at once. The format set is small and fixed,
    /// so the fan-out is unbounded.
    ///
    /// A failed job never cancels its siblings; the orchestrator
    /// waits for every job to settle and then reports the first
    /// error, so no external encoder process is left orphaned.
    pub async fn transcode(&self, input: &Path, jobs: Vec<EncodeJob>) -> KawaResult<()> {
        let mut tasks: JoinSet<KawaResult<()>> = JoinSet::new();
        for mut job in jobs {
            if job.output_path == input {
                // Direct downloads may already occupy {assetId}.mp4.
                job.output_path.add_suffix("enc");
                tracing::warn!(
                    "Encode target collides with its input, writing to {} instead.",
                    job.output_path.display()
                );
            }

            let encoder = self.encoder.clone();
            let progress = self.progress.clone();
            let input = input.to_path_buf();
            tasks.spawn(async move { encoder.encode(&input, &job, progress).await });
        }

        let mut first_error: Option<KawaError> = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::error!("Encode job failed: {e}");
                    first_error.get_or_insert(e);
                }
                Err(e) => {
                    first_error.get_or_insert(KawaError::JoinError(e));
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// `ffmpeg` CLI encoder with `-progress` key-value parsing.
pub struct FfmpegEncoder {
    ffmpeg: PathBuf,
    ffprobe: Option<PathBuf>,
}

impl FfmpegEncoder {
    pub fn new() -> KawaResult<Self> {
        Ok(Self {
            ffmpeg: which::which("ffmpeg")?,
            // Without ffprobe only the terminal 100% tick is emitted.
            ffprobe: which::which("ffprobe").ok(),
        })
    }

    /// Use explicit program paths instead of a `PATH` lookup.
    pub fn with_programs(ffmpeg: PathBuf, ffprobe: Option<PathBuf>) -> Self {
        Self { ffmpeg, ffprobe }
    }

    async fn probe_duration_secs(&self, input: &Path) -> Option<f64> {
        let ffprobe = self.ffprobe.as_ref()?;
        let output = Command::new(ffprobe)
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(input)
            .output()
            .await
            .ok()?;
        String::from_utf8_lossy(&output.stdout).trim().parse().ok()
    }
}

impl Encoder for FfmpegEncoder {
    async fn encode(
        &self,
        input: &Path,
        job: &EncodeJob,
        on_progress: SharedProgressSink,
    ) -> KawaResult<()> {
        let duration = self.probe_duration_secs(input).await;
        let params = &job.params;
        let bitrate = format!("{}k", params.video_bitrate_k);
        let bufsize = format!("{}k", params.video_bitrate_k * 2);

        let mut child = Command::new(&self.ffmpeg)
            .arg("-y")
            .arg("-i")
            .arg(input)
            .args(["-c:v", &params.video_codec])
            .args(["-b:v", &bitrate, "-minrate", &bitrate, "-maxrate", &bitrate])
            .args(["-bufsize", &bufsize])
            .args(["-preset", &params.preset])
            .args(["-g", &params.keyframe_interval.to_string()])
            .args(["-keyint_min", &params.min_keyframe_interval.to_string()])
            .args(["-c:a", &params.audio_codec])
            .args(["-ac", &params.audio_channels.to_string()])
            .args(["-f", &params.container])
            .args(["-progress", "pipe:1", "-loglevel", "error"])
            .arg(&job.output_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // Drained concurrently with the progress loop; ffmpeg stalls
        // on stderr writes once the pipe buffer fills.
        let stderr = child.stderr.take();
        let stderr_task = tokio::spawn(async move {
            let mut buffer = Vec::new();
            if let Some(mut stderr) = stderr {
                let _ = stderr.read_to_end(&mut buffer).await;
            }
            buffer
        });

        if let Some(stdout) = child.stdout.take() {
            let mut lines = BufReader::new(stdout).lines();
            while let Some(line) = lines.next_line().await? {
                let Some(value) = line.strip_prefix("out_time_us=") else {
                    continue;
                };
                let (Some(duration), Ok(us)) = (duration, value.parse::<f64>()) else {
                    continue;
                };
                let percent = (us / 1_000_000.0 / duration * 100.0).clamp(0.0, 100.0);
                on_progress.emit(ProgressEvent::Encode {
                    format: job.format.clone(),
                    percent: percent.round() as u32,
                });
            }
        }

        let status = child.wait().await?;
        let stderr = stderr_task.await?;
        if !status.success() {
            return Err(KawaError::EncodeError {
                format: job.format.clone(),
                message: String::from_utf8_lossy(&stderr).trim().to_string(),
            });
        }

        on_progress.emit(ProgressEvent::Encode {
            format: job.format.clone(),
            percent: 100,
        });
        Ok(())
    }
}
