//! Embedded Subtitle Tracks
//!
//! Discovery (probing) and extraction (demuxing) of subtitle streams
//! embedded in a video container:
//! - [`TrackProber`] tries ffprobe JSON first, then `ffmpeg -i` diagnostics
//! - [`TrackExtractor`] demuxes one stream to a temporary SRT file and parses it

mod extract;
mod probe;

pub use extract::{FfmpegDemuxer, SubtitleDemuxer, TrackExtractor};
pub use probe::{
    parse_ffmpeg_diagnostics, parse_ffprobe_json, FfmpegInspectStrategy, FfprobeStrategy,
    TrackProbeStrategy, TrackProber,
};

use serde::{Deserialize, Serialize};

/// A subtitle stream found in a container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubtitleTrack {
    /// Zero-based position among the container's subtitle streams (`0:s:N`)
    pub subtitle_index: usize,
    /// Container-global stream index, when the probe reported one
    pub stream_index: Option<u32>,
    /// Language code as tagged in the container (may be empty)
    pub language: String,
    /// Stream title (may be empty)
    pub title: String,
    /// Codec name, e.g. `subrip`, `ass`, `hdmv_pgs_subtitle`
    pub codec: String,
}

impl SubtitleTrack {
    pub fn new(subtitle_index: usize) -> Self {
        Self {
            subtitle_index,
            stream_index: None,
            language: String::new(),
            title: String::new(),
            codec: String::new(),
        }
    }

    /// Menu label for this track.
    pub fn display_name(&self) -> String {
        let lang_name = language_name(&self.language);
        let number = self.subtitle_index + 1;

        if !self.title.is_empty() {
            if title_names_language(&self.title) {
                return self.title.clone();
            }
            return match lang_name {
                Some(lang) => format!("{} [{}]", self.title, lang),
                None => self.title.clone(),
            };
        }

        match lang_name {
            Some(lang) => format!("{} (Track {})", lang, number),
            None => format!("Track {}", number),
        }
    }

    /// Whether the codec is bitmap-based and cannot be converted to SRT
    pub fn is_bitmap(&self) -> bool {
        matches!(
            self.codec.as_str(),
            "hdmv_pgs_subtitle" | "dvd_subtitle" | "dvb_subtitle" | "xsub"
        )
    }
}

/// A title that already carries a language hint is shown unchanged
fn title_names_language(title: &str) -> bool {
    let lower = title.to_lowercase();
    title.contains('[') || title.contains('(') || lower.contains("рус") || lower.contains("eng")
}

/// Maps an ISO 639-1/639-2 code to a readable language name.
///
/// Unknown codes are upper-cased; an empty code has no name.
pub fn language_name(code: &str) -> Option<String> {
    if code.is_empty() {
        return None;
    }

    let name = match code.to_lowercase().as_str() {
        "eng" | "en" => "English",
        "rus" | "ru" => "Русский",
        "ukr" | "uk" => "Українська",
        "spa" | "es" => "Español",
        "fra" | "fre" | "fr" => "Français",
        "deu" | "ger" | "de" => "Deutsch",
        "ita" | "it" => "Italiano",
        "por" | "pt" => "Português",
        "jpn" | "ja" => "日本語",
        "kor" | "ko" => "한국어",
        "chi" | "zho" | "zh" => "中文",
        "ara" | "ar" => "العربية",
        "hin" | "hi" => "हिन्दी",
        "tur" | "tr" => "Türkçe",
        "pol" | "pl" => "Polski",
        "nld" | "dut" | "nl" => "Nederlands",
        "swe" | "sv" => "Svenska",
        "nor" | "no" => "Norsk",
        "fin" | "fi" => "Suomi",
        "dan" | "da" => "Dansk",
        "ces" | "cze" | "cs" => "Čeština",
        "hun" | "hu" => "Magyar",
        "ron" | "rum" | "ro" => "Română",
        "bul" | "bg" => "Български",
        "ell" | "gre" | "el" => "Ελληνικά",
        "heb" | "he" => "עברית",
        "tha" | "th" => "ไทย",
        "vie" | "vi" => "Tiếng Việt",
        "ind" | "id" => "Bahasa Indonesia",
        "msa" | "may" | "ms" => "Bahasa Melayu",
        "und" => "Unknown",
        _ => return Some(code.to_uppercase()),
    };

    Some(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(index: usize, language: &str, title: &str) -> SubtitleTrack {
        SubtitleTrack {
            language: language.to_string(),
            title: title.to_string(),
            ..SubtitleTrack::new(index)
        }
    }

    #[test]
    fn test_language_name() {
        assert_eq!(language_name("eng").as_deref(), Some("English"));
        assert_eq!(language_name("RU").as_deref(), Some("Русский"));
        assert_eq!(language_name("und").as_deref(), Some("Unknown"));
        assert_eq!(language_name("xyz").as_deref(), Some("XYZ"));
        assert_eq!(language_name(""), None);
    }

    #[test]
    fn test_display_name_without_title() {
        assert_eq!(track(0, "eng", "").display_name(), "English (Track 1)");
        assert_eq!(track(2, "", "").display_name(), "Track 3");
    }

    #[test]
    fn test_display_name_with_title() {
        assert_eq!(track(0, "rus", "Full").display_name(), "Full [Русский]");
        assert_eq!(track(0, "", "Signs").display_name(), "Signs");
        assert_eq!(track(0, "rus", "Full (русский)").display_name(), "Full (русский)");
        assert_eq!(track(0, "eng", "English SDH").display_name(), "English SDH");
        assert_eq!(track(1, "jpn", "Songs [JP]").display_name(), "Songs [JP]");
    }

    #[test]
    fn test_bitmap_codecs() {
        let mut t = track(0, "eng", "");
        t.codec = "hdmv_pgs_subtitle".into();
        assert!(t.is_bitmap());
        t.codec = "subrip".into();
        assert!(!t.is_bitmap());
    }
}
