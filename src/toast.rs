use std::collections::VecDeque;
use std::time::{Duration, Instant};

pub const MAX_TOASTS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
    Success,
    Error,
    Info,
}

impl ToastKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ToastKind::Success => "success",
            ToastKind::Error => "error",
            ToastKind::Info => "info",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub kind: ToastKind,
    pub text: String,
    shown_at: Instant,
}

/// Transient notification stack, newest last.
#[derive(Debug, Clone)]
pub struct Toasts {
    items: VecDeque<Toast>,
    ttl: Duration,
}

impl Toasts {
    pub fn new(ttl: Duration) -> Self {
        Self {
            items: VecDeque::with_capacity(MAX_TOASTS),
            ttl,
        }
    }

    pub fn push(&mut self, kind: ToastKind, text: impl Into<String>) {
        self.push_at(kind, text, Instant::now());
    }

    pub fn push_at(&mut self, kind: ToastKind, text: impl Into<String>, now: Instant) {
        let text = text.into();
        tracing::debug!(kind = kind.as_str(), %text, "toast");
        if self.items.len() == MAX_TOASTS {
            self.items.pop_front();
        }
        self.items.push_back(Toast {
            kind,
            text,
            shown_at: now,
        });
    }

    pub fn success(&mut self, text: impl Into<String>) {
        self.push(ToastKind::Success, text);
    }

    pub fn error(&mut self, text: impl Into<String>) {
        self.push(ToastKind::Error, text);
    }

    pub fn info(&mut self, text: impl Into<String>) {
        self.push(ToastKind::Info, text);
    }

    /// Drops expired toasts. Returns true when anything was removed.
    pub fn prune(&mut self, now: Instant) -> bool {
        let before = self.items.len();
        let ttl = self.ttl;
        self.items
            .retain(|toast| now.saturating_duration_since(toast.shown_at) < ttl);
        before != self.items.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Toast> {
        self.items.iter()
    }

    pub fn latest(&self) -> Option<&Toast> {
        self.items.back()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toasts_expire_after_ttl() {
        let start = Instant::now();
        let mut toasts = Toasts::new(Duration::from_millis(3500));
        toasts.push_at(ToastKind::Success, "Saved", start);
        toasts.push_at(ToastKind::Info, "Later", start + Duration::from_secs(2));

        assert!(!toasts.prune(start + Duration::from_secs(3)));
        assert!(toasts.prune(start + Duration::from_secs(4)));
        assert_eq!(toasts.len(), 1);
        assert_eq!(toasts.latest().map(|t| t.text.as_str()), Some("Later"));
        assert!(toasts.prune(start + Duration::from_secs(6)));
        assert!(toasts.is_empty());
    }

    #[test]
    fn stack_is_bounded_and_keeps_newest() {
        let mut toasts = Toasts::new(Duration::from_secs(10));
        for n in 0..8 {
            toasts.error(format!("e{n}"));
        }
        let texts: Vec<&str> = toasts.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["e3", "e4", "e5", "e6", "e7"]);
        assert_eq!(toasts.latest().map(|t| t.kind), Some(ToastKind::Error));
    }
}
