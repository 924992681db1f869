//! A line-oriented hypertext sink a handler writes to.
//!
//! Exactly one status line per response; the writer refuses body output
//! once a non-`20` status has been sent, and refuses a second status line
//! outright. Concurrent calls are not supported - a `Writer` is borrowed
//! mutably by exactly one handler for the lifetime of a request.

use tokio::io::{AsyncWrite, AsyncWriteExt};

pub struct Writer<W> {
    inner: W,
    status_written: bool,
    body_allowed: bool,
}

impl<W: AsyncWrite + Unpin> Writer<W> {
    pub fn new(inner: W) -> Self {
        Writer {
            inner,
            status_written: false,
            body_allowed: false,
        }
    }

    /// Emit the single status line. Body operations are only valid
    /// afterwards when `code == 20`.
    pub async fn status(&mut self, code: u32, meta: &str) -> std::io::Result<()> {
        if self.status_written {
            tracing::warn!(code, meta, "ignoring duplicate status line");
            return Ok(());
        }
        self.status_written = true;
        self.body_allowed = code == 20;
        let line = format!("{code} {meta}\r\n");
        self.inner.write_all(line.as_bytes()).await
    }

    pub async fn statusf(&mut self, code: u32, args: std::fmt::Arguments<'_>) -> std::io::Result<()> {
        self.status(code, &args.to_string()).await
    }

    /// Shorthand for `Status(20, "text/gemini")`.
    pub async fn ok(&mut self) -> std::io::Result<()> {
        self.status(20, "text/gemini").await
    }

    pub async fn redirect(&mut self, path: &str) -> std::io::Result<()> {
        self.status(30, path).await
    }

    pub async fn error(&mut self) -> std::io::Result<()> {
        self.status(50, "Error").await
    }

    async fn body_line(&mut self, line: &str) -> std::io::Result<()> {
        if !self.body_allowed {
            tracing::warn!("body write attempted after non-20 status or before any status");
            return Ok(());
        }
        self.inner.write_all(line.as_bytes()).await?;
        self.inner.write_all(b"\r\n").await
    }

    pub async fn title(&mut self, s: &str) -> std::io::Result<()> {
        self.body_line(&format!("# {s}")).await
    }

    pub async fn titlef(&mut self, args: std::fmt::Arguments<'_>) -> std::io::Result<()> {
        self.title(&args.to_string()).await
    }

    pub async fn subtitle(&mut self, s: &str) -> std::io::Result<()> {
        self.body_line(&format!("## {s}")).await
    }

    pub async fn text(&mut self, s: &str) -> std::io::Result<()> {
        self.body_line(s).await
    }

    pub async fn quote(&mut self, s: &str) -> std::io::Result<()> {
        self.body_line(&format!("> {s}")).await
    }

    pub async fn separator(&mut self) -> std::io::Result<()> {
        self.body_line("---").await
    }

    pub async fn empty(&mut self) -> std::io::Result<()> {
        self.body_line("").await
    }

    pub async fn link(&mut self, url: &str, label: &str) -> std::io::Result<()> {
        self.body_line(&format!("=> {url} {label}")).await
    }

    pub async fn linkf(&mut self, url: &str, args: std::fmt::Arguments<'_>) -> std::io::Result<()> {
        self.link(url, &args.to_string()).await
    }

    /// Returns the underlying connection, used by `register` to read the
    /// client certificate directly off the TLS session.
    pub fn unwrap(self) -> W {
        self.inner
    }

    /// Direct access to the connection below the status-line invariants,
    /// used only to read the request line before any status has been sent.
    pub fn inner_mut(&mut self) -> &mut W {
        &mut self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn status_then_body_writes_expected_lines() {
        let mut buf = Vec::new();
        {
            let mut w = Writer::new(&mut buf);
            w.ok().await.unwrap();
            w.title("Hello").await.unwrap();
            w.link("/a", "A").await.unwrap();
        }
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text, "20 text/gemini\r\n# Hello\r\n=> /a A\r\n");
    }

    #[tokio::test]
    async fn body_after_failure_status_is_suppressed() {
        let mut buf = Vec::new();
        {
            let mut w = Writer::new(&mut buf);
            w.status(40, "nope").await.unwrap();
            w.title("should not appear").await.unwrap();
        }
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text, "40 nope\r\n");
    }

    #[tokio::test]
    async fn second_status_call_is_ignored() {
        let mut buf = Vec::new();
        {
            let mut w = Writer::new(&mut buf);
            w.ok().await.unwrap();
            w.status(50, "late").await.unwrap();
            w.text("after").await.unwrap();
        }
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text, "20 text/gemini\r\nafter\r\n");
    }
}
