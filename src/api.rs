use serde::Serialize;

const CHAT_STREAM_PATH: &str = "/api/chat/rag/stream";
const FILE_UPLOAD_PATH: &str = "/api/knowledge/upload";

/// Resolved URLs for every server operation, derived from one deployment host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiEndpoints {
    pub chat_stream: String,
    pub file_upload: String,
}

impl ApiEndpoints {
    pub fn new(host: &str) -> Self {
        let host = host.trim_end_matches('/');
        Self {
            chat_stream: format!("{}{}", host, CHAT_STREAM_PATH),
            file_upload: format!("{}{}", host, FILE_UPLOAD_PATH),
        }
    }

    /// Streaming URL for one question. `top_k` is passed through unmodified.
    pub fn chat_stream_url(&self, question: &str, top_k: u32) -> String {
        format!(
            "{}?question={}&topK={}",
            self.chat_stream,
            urlencoding::encode(question),
            top_k
        )
    }
}
