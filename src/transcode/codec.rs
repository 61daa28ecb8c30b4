//! Recorder output candidates, in preference order.

struct CandidateRow {
    mime_type: &'static str,
    extension: &'static str,
    label: &'static str,
}

macro_rules! codec_table {
    (
        $( [$mime:expr, $ext:expr, $label:expr] ),* $(,)?
    ) => {
        const CANDIDATE_TABLE: &[CandidateRow] = &[
            $( CandidateRow {
                mime_type: $mime,
                extension: $ext,
                label: $label,
            } ),*
        ];

        /// Candidate MIME types from CANDIDATE_TABLE, most preferred first.
        pub const CANDIDATE_MIME_TYPES: &[&str] = &[ $($mime),* ];
    };
}

codec_table!(
    ["video/webm;codecs=vp9,opus", "webm", "VP9 + Opus (WebM)"],
    ["video/webm;codecs=vp8,opus", "webm", "VP8 + Opus (WebM)"],
    ["video/webm", "webm", "WebM (runtime default codecs)"],
    ["video/mp4;codecs=avc1.42E01E,mp4a.40.2", "mp4", "H.264 Baseline + AAC (MP4)"],
    ["video/mp4", "mp4", "MP4 (runtime default codecs)"],
);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NegotiatedCodec {
    pub mime_type: &'static str,
    pub extension: &'static str,
    pub label: &'static str,
}

/// First candidate the host says it can record, if any.
pub fn negotiate(is_supported: impl Fn(&str) -> bool) -> Option<NegotiatedCodec> {
    CANDIDATE_TABLE
        .iter()
        .find(|row| is_supported(row.mime_type))
        .map(|row| NegotiatedCodec {
            mime_type: row.mime_type,
            extension: row.extension,
            label: row.label,
        })
}
