// FormatSelector - unified format selection logic
//
// Converts raw formats from the InfoExtractor into chat-friendly options and
// picks one of them. Handles:
// - Best audio detection (AAC preferred, then bitrate)
// - Best video detection with an MP4/H.264 compatibility preference
// - Prompt option lists (deduplicated, capped to the select-menu limit)
// - Validation of explicit or prompted format ids

use std::cmp::Ordering;

use super::errors::PipelineError;
use super::extractors::ExtendedFormat;
use super::models::{FormatChoice, FormatOption, MediaKind};

/// Discord select menus accept at most 25 options
pub const MAX_PROMPT_OPTIONS: usize = 25;

/// Format selector with smart quality detection
pub struct FormatSelector;

impl FormatSelector {
    /// Build the ordered option list from raw formats, dropping storyboards.
    pub fn build_options(formats: &[ExtendedFormat]) -> Vec<FormatOption> {
        formats
            .iter()
            .filter(|f| f.is_usable())
            .map(|f| {
                let is_audio_only = f.has_audio() && !f.has_video();
                let label = if is_audio_only {
                    "Audio".to_string()
                } else if let Some(h) = f.height {
                    format!("{}p", h)
                } else {
                    f.format_note.clone().unwrap_or_else(|| "Video".to_string())
                };

                FormatOption {
                    format_id: f.format_id.clone(),
                    label,
                    is_audio_only,
                    is_video_only: f.has_video() && !f.has_audio(),
                    ext: f.ext.clone(),
                    height: f.height,
                    abr: f.abr,
                    is_h264: f.is_h264(),
                    is_aac: f.is_aac(),
                    filesize: f.effective_size(),
                }
            })
            .collect()
    }

    /// Options worth offering in a prompt for the given target kind.
    ///
    /// Audio requests list audio-only streams by bitrate. Video requests list one
    /// entry per resolution label, highest first, keeping the most compatible stream.
    pub fn prompt_options(options: &[FormatOption], kind: MediaKind) -> Vec<FormatOption> {
        let mut picked: Vec<FormatOption> = match kind {
            MediaKind::Audio => {
                let mut audio: Vec<FormatOption> =
                    options.iter().filter(|o| o.is_audio_only).cloned().collect();
                audio.sort_by(|a, b| Self::audio_rank(b, a));
                audio
            }
            MediaKind::Video => {
                let mut video: Vec<FormatOption> =
                    options.iter().filter(|o| !o.is_audio_only).cloned().collect();
                video.sort_by(|a, b| Self::video_rank(b, a));

                let mut seen = Vec::new();
                video.retain(|o| {
                    if seen.contains(&o.label) {
                        false
                    } else {
                        seen.push(o.label.clone());
                        true
                    }
                });
                video
            }
        };

        picked.truncate(MAX_PROMPT_OPTIONS);
        picked
    }

    /// Automatic policy.
    ///
    /// Audio: best audio-only stream, else best combined stream.
    /// Video: mp4 video + m4a audio, else combined mp4, else any video + any audio,
    /// else any combined stream.
    pub fn automatic(options: &[FormatOption], kind: MediaKind) -> Result<FormatChoice, PipelineError> {
        let audio_only: Vec<&FormatOption> = options.iter().filter(|o| o.is_audio_only).collect();
        let video_only: Vec<&FormatOption> = options.iter().filter(|o| o.is_video_only).collect();
        let combined: Vec<&FormatOption> = options
            .iter()
            .filter(|o| !o.is_audio_only && !o.is_video_only)
            .collect();

        match kind {
            MediaKind::Audio => {
                if let Some(audio) = Self::find_best_audio(&audio_only) {
                    return Ok(Self::single(audio));
                }
                Self::find_best_video(&combined)
                    .map(Self::single)
                    .ok_or_else(|| {
                        PipelineError::Resolution("No format with an audio stream is available".to_string())
                    })
            }
            MediaKind::Video => {
                let mp4_video: Vec<&FormatOption> =
                    video_only.iter().copied().filter(|o| o.ext == "mp4").collect();
                let m4a_audio: Vec<&FormatOption> =
                    audio_only.iter().copied().filter(|o| o.ext == "m4a").collect();
                if let (Some(v), Some(a)) = (Self::find_best_video(&mp4_video), Self::find_best_audio(&m4a_audio)) {
                    return Ok(Self::merged(v, a));
                }

                let mp4_combined: Vec<&FormatOption> =
                    combined.iter().copied().filter(|o| o.ext == "mp4").collect();
                if let Some(c) = Self::find_best_video(&mp4_combined) {
                    return Ok(Self::single(c));
                }

                if let (Some(v), Some(a)) = (Self::find_best_video(&video_only), Self::find_best_audio(&audio_only)) {
                    return Ok(Self::merged(v, a));
                }

                Self::find_best_video(&combined)
                    .map(Self::single)
                    .ok_or_else(|| {
                        PipelineError::Resolution("No format with both video and audio is available".to_string())
                    })
            }
        }
    }

    /// Resolve an explicit or prompted format id against the offered options.
    pub fn pick(options: &[FormatOption], format_id: &str, kind: MediaKind) -> Result<FormatChoice, PipelineError> {
        let option = options.iter().find(|o| o.format_id == format_id).ok_or_else(|| {
            PipelineError::InvalidSelection(format!("format '{}' is not offered by this source", format_id))
        })?;

        match kind {
            MediaKind::Video if option.is_audio_only => Err(PipelineError::InvalidSelection(format!(
                "format '{}' has no video stream",
                format_id
            ))),
            MediaKind::Audio if option.is_video_only => Err(PipelineError::InvalidSelection(format!(
                "format '{}' has no audio stream",
                format_id
            ))),
            _ => Ok(Self::for_option(option, kind)),
        }
    }

    /// Turn one option into a download expression. Video-only streams picked for
    /// a video request are merged with the best audio.
    pub fn for_option(option: &FormatOption, kind: MediaKind) -> FormatChoice {
        if kind == MediaKind::Video && option.is_video_only {
            return FormatChoice {
                format_id: option.format_id.clone(),
                spec: format!(
                    "{id}+bestaudio[ext=m4a]/{id}+bestaudio",
                    id = option.format_id
                ),
                label: option.label.clone(),
            };
        }
        Self::single(option)
    }

    /// One-line description for a prompt entry (e.g. "mp4 · H.264 · 45 MB")
    pub fn describe(option: &FormatOption) -> String {
        let mut parts = vec![option.ext.clone()];
        if option.is_audio_only {
            if let Some(abr) = option.abr {
                parts.push(format!("{:.0} kbps", abr));
            }
        } else {
            if option.is_h264 {
                parts.push("H.264".to_string());
            }
            if option.is_video_only {
                parts.push("+ best audio".to_string());
            }
        }
        if let Some(size) = Self::format_size(option.filesize) {
            parts.push(size);
        }
        parts.join(" · ")
    }

    fn single(option: &FormatOption) -> FormatChoice {
        FormatChoice {
            format_id: option.format_id.clone(),
            spec: option.format_id.clone(),
            label: option.label.clone(),
        }
    }

    fn merged(video: &FormatOption, audio: &FormatOption) -> FormatChoice {
        FormatChoice {
            format_id: video.format_id.clone(),
            spec: format!("{}+{}", video.format_id, audio.format_id),
            label: video.label.clone(),
        }
    }

    /// Find best video format (highest resolution, then H.264, then size)
    fn find_best_video<'a>(formats: &[&'a FormatOption]) -> Option<&'a FormatOption> {
        formats.iter().copied().max_by(|a, b| Self::video_rank(a, b))
    }

    /// Find best audio format (prefer AAC for compatibility, then bitrate)
    fn find_best_audio<'a>(formats: &[&'a FormatOption]) -> Option<&'a FormatOption> {
        formats.iter().copied().max_by(|a, b| Self::audio_rank(a, b))
    }

    fn video_rank(a: &FormatOption, b: &FormatOption) -> Ordering {
        a.height
            .unwrap_or(0)
            .cmp(&b.height.unwrap_or(0))
            .then(a.is_h264.cmp(&b.is_h264))
            .then((a.ext == "mp4").cmp(&(b.ext == "mp4")))
            .then(a.filesize.unwrap_or(0).cmp(&b.filesize.unwrap_or(0)))
    }

    fn audio_rank(a: &FormatOption, b: &FormatOption) -> Ordering {
        a.is_aac
            .cmp(&b.is_aac)
            .then(
                a.abr
                    .unwrap_or(0.0)
                    .partial_cmp(&b.abr.unwrap_or(0.0))
                    .unwrap_or(Ordering::Equal),
            )
    }

    /// Format file size for display
    fn format_size(bytes: Option<u64>) -> Option<String> {
        bytes.map(|b| {
            let mb = b as f64 / 1_048_576.0;
            if mb >= 1024.0 {
                format!("{:.1} GB", mb / 1024.0)
            } else {
                format!("{:.0} MB", mb)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video(id: &str, height: u32, ext: &str, vcodec: &str, with_audio: bool) -> ExtendedFormat {
        ExtendedFormat {
            format_id: id.to_string(),
            ext: ext.to_string(),
            width: Some(height * 16 / 9),
            height: Some(height),
            vcodec: Some(vcodec.to_string()),
            acodec: Some(if with_audio { "mp4a.40.2" } else { "none" }.to_string()),
            filesize: Some(height as u64 * 100_000),
            ..Default::default()
        }
    }

    fn audio(id: &str, ext: &str, acodec: &str, abr: f32) -> ExtendedFormat {
        ExtendedFormat {
            format_id: id.to_string(),
            ext: ext.to_string(),
            vcodec: Some("none".to_string()),
            acodec: Some(acodec.to_string()),
            abr: Some(abr),
            ..Default::default()
        }
    }

    fn youtube_like() -> Vec<FormatOption> {
        FormatSelector::build_options(&[
            audio("249", "webm", "opus", 50.0),
            audio("251", "webm", "opus", 160.0),
            audio("140", "m4a", "mp4a.40.2", 129.0),
            video("18", 360, "mp4", "avc1.42001E", true),
            video("22", 720, "mp4", "avc1.64001F", true),
            video("136", 720, "mp4", "avc1.4d401f", false),
            video("247", 720, "webm", "vp9", false),
            video("137", 1080, "mp4", "avc1.640028", false),
            video("248", 1080, "webm", "vp9", false),
        ])
    }

    #[test]
    fn test_build_options_labels_and_filters() {
        let mut raw = vec![audio("140", "m4a", "mp4a.40.2", 129.0)];
        raw.push(ExtendedFormat {
            format_id: "sb0".to_string(),
            ext: "mhtml".to_string(),
            vcodec: Some("none".to_string()),
            acodec: Some("none".to_string()),
            ..Default::default()
        });
        raw.push(video("22", 720, "mp4", "avc1", true));

        let options = FormatSelector::build_options(&raw);
        assert_eq!(options.len(), 2);
        assert_eq!(options[0].label, "Audio");
        assert!(options[0].is_audio_only);
        assert_eq!(options[1].label, "720p");
        assert!(!options[1].is_video_only);
    }

    #[test]
    fn test_automatic_audio_single_format() {
        let options = FormatSelector::build_options(&[audio("140", "m4a", "mp4a.40.2", 129.0)]);
        let choice = FormatSelector::automatic(&options, MediaKind::Audio).unwrap();
        assert_eq!(choice.format_id, "140");
        assert_eq!(choice.spec, "140");
    }

    #[test]
    fn test_automatic_audio_prefers_aac() {
        let choice = FormatSelector::automatic(&youtube_like(), MediaKind::Audio).unwrap();
        assert_eq!(choice.format_id, "140");
    }

    #[test]
    fn test_automatic_audio_falls_back_to_combined() {
        let options = FormatSelector::build_options(&[video("18", 360, "mp4", "avc1", true)]);
        let choice = FormatSelector::automatic(&options, MediaKind::Audio).unwrap();
        assert_eq!(choice.spec, "18");
    }

    #[test]
    fn test_automatic_video_merges_mp4_with_m4a() {
        let choice = FormatSelector::automatic(&youtube_like(), MediaKind::Video).unwrap();
        assert_eq!(choice.spec, "137+140");
        assert_eq!(choice.label, "1080p");
    }

    #[test]
    fn test_automatic_video_combined_mp4_fallback() {
        let options = FormatSelector::build_options(&[
            audio("251", "webm", "opus", 160.0),
            video("18", 360, "mp4", "avc1", true),
            video("43", 360, "webm", "vp8", true),
        ]);
        let choice = FormatSelector::automatic(&options, MediaKind::Video).unwrap();
        assert_eq!(choice.spec, "18");
    }

    #[test]
    fn test_automatic_video_any_container_fallback() {
        let options = FormatSelector::build_options(&[
            audio("251", "webm", "opus", 160.0),
            video("248", 1080, "webm", "vp9", false),
        ]);
        let choice = FormatSelector::automatic(&options, MediaKind::Video).unwrap();
        assert_eq!(choice.spec, "248+251");
    }

    #[test]
    fn test_automatic_video_without_video_fails() {
        let options = FormatSelector::build_options(&[audio("140", "m4a", "mp4a.40.2", 129.0)]);
        assert!(matches!(
            FormatSelector::automatic(&options, MediaKind::Video),
            Err(PipelineError::Resolution(_))
        ));
    }

    #[test]
    fn test_prompt_options_dedup_video_labels() {
        let prompt = FormatSelector::prompt_options(&youtube_like(), MediaKind::Video);
        let labels: Vec<&str> = prompt.iter().map(|o| o.label.as_str()).collect();
        assert_eq!(labels, vec!["1080p", "720p", "360p"]);
        // H.264 wins over VP9 at the same height
        assert_eq!(prompt[0].format_id, "137");
    }

    #[test]
    fn test_prompt_options_audio_sorted() {
        let prompt = FormatSelector::prompt_options(&youtube_like(), MediaKind::Audio);
        let ids: Vec<&str> = prompt.iter().map(|o| o.format_id.as_str()).collect();
        assert_eq!(ids, vec!["140", "251", "249"]);
    }

    #[test]
    fn test_prompt_options_capped() {
        let raw: Vec<ExtendedFormat> = (1..=40)
            .map(|i| audio(&format!("a{}", i), "webm", "opus", i as f32))
            .collect();
        let options = FormatSelector::build_options(&raw);
        assert_eq!(
            FormatSelector::prompt_options(&options, MediaKind::Audio).len(),
            MAX_PROMPT_OPTIONS
        );
    }

    #[test]
    fn test_pick_merges_video_only() {
        let choice = FormatSelector::pick(&youtube_like(), "137", MediaKind::Video).unwrap();
        assert_eq!(choice.spec, "137+bestaudio[ext=m4a]/137+bestaudio");

        let combined = FormatSelector::pick(&youtube_like(), "22", MediaKind::Video).unwrap();
        assert_eq!(combined.spec, "22");
    }

    #[test]
    fn test_pick_unknown_id_is_invalid_selection() {
        assert!(matches!(
            FormatSelector::pick(&youtube_like(), "999", MediaKind::Video),
            Err(PipelineError::InvalidSelection(_))
        ));
    }

    #[test]
    fn test_pick_rejects_stream_missing_requested_track() {
        assert!(matches!(
            FormatSelector::pick(&youtube_like(), "140", MediaKind::Video),
            Err(PipelineError::InvalidSelection(_))
        ));
        assert!(matches!(
            FormatSelector::pick(&youtube_like(), "137", MediaKind::Audio),
            Err(PipelineError::InvalidSelection(_))
        ));
        // combined streams carry both tracks
        assert_eq!(FormatSelector::pick(&youtube_like(), "22", MediaKind::Audio).unwrap().spec, "22");
    }

    #[test]
    fn test_describe() {
        let options = youtube_like();
        let aac = options.iter().find(|o| o.format_id == "140").unwrap();
        assert_eq!(FormatSelector::describe(aac), "m4a · 129 kbps");
    }
}
