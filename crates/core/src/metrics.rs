pub struct Metrics {
    registry: prometheus::Registry,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            registry: prometheus::Registry::new(),
        }
    }

    pub fn registry(&self) -> &prometheus::Registry {
        &self.registry
    }

    pub fn gather(&self) -> String {
        use prometheus::Encoder;

        let encoder = prometheus::TextEncoder::new();
        let mf = self.registry.gather();
        let mut buf = Vec::new();
        let _ = encoder.encode(&mf, &mut buf);
        String::from_utf8_lossy(&buf).to_string()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
