use tracing_subscriber::fmt::MakeWriter;

/// A writer that redacts API keys from log output.
pub struct RedactingWriter<W> {
    inner: W,
}

impl RedactingWriter<std::io::Stderr> {
    pub fn stderr() -> Self {
        Self {
            inner: std::io::stderr(),
        }
    }
}

impl<W: std::io::Write> std::io::Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let original = String::from_utf8_lossy(buf);
        let redacted = redact_secrets(&original);
        self.inner.write_all(redacted.as_bytes())?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

impl<'a> MakeWriter<'a> for RedactingWriter<std::io::Stderr> {
    type Writer = RedactingWriter<std::io::Stderr>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter {
            inner: std::io::stderr(),
        }
    }
}

/// Replace known API key patterns with `[REDACTED]`.
pub fn redact_secrets(input: &str) -> String {
    static PATTERNS: std::sync::LazyLock<regex::Regex> = std::sync::LazyLock::new(|| {
        regex::Regex::new(
            r"(?x)
              AIza[0-9A-Za-z_\-]{20,}   # Google API keys
            | gsk_[0-9A-Za-z]{20,}      # Groq keys
            | sk-[0-9A-Za-z_\-]{20,}    # OpenAI-style keys
            ",
        )
        .expect("redaction regex should compile")
    });
    // Query-string credentials, e.g. `?key=...` on turn-content endpoints.
    static QUERY_KEY: std::sync::LazyLock<regex::Regex> = std::sync::LazyLock::new(|| {
        regex::Regex::new(r"([?&]key=)[^&\s)]+").expect("query redaction regex should compile")
    });

    let redacted = PATTERNS.replace_all(input, "[REDACTED]");
    QUERY_KEY
        .replace_all(&redacted, "${1}[REDACTED]")
        .into_owned()
}
