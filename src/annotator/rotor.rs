use crate::annotator::audit;
use crate::annotator::util::fingerprint;
use crate::annotator::warn::{self, WarnEvent};
use crate::error::{ProviderError, RotorError};
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

pub const DEFAULT_COOLDOWN_SECS: u64 = 600;
/// Longest cooldown honoured, whatever the provider asks for.
pub const MAX_COOLDOWN_SECS: u64 = 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// One API key bound to the model and endpoint it is used with.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub provider: String,
    pub model: String,
    pub base_url: String,
    pub key: String,
}

impl Credential {
    pub fn fingerprint(&self) -> String {
        fingerprint(&self.key)
    }

    /// `provider/model#fingerprint`, never the key itself.
    pub fn label(&self) -> String {
        format!("{}/{}#{}", self.provider, self.model, self.fingerprint())
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("key", &self.fingerprint())
            .finish()
    }
}

/// A single completion call against one credential.
pub trait ChatBackend {
    fn complete(
        &self,
        credential: &Credential,
        messages: &[ChatMessage],
        temperature: f64,
    ) -> Result<String, ProviderError>;
}

/// What the orchestrator needs from the request layer.
pub trait ChatClient {
    fn chat(&mut self, messages: &[ChatMessage], temperature: f64) -> anyhow::Result<String>;
}

pub trait Clock {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

fn retry_hint_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"try again in (?:(\d+)h)?(?:(\d+)m)?(\d+(?:\.\d+)?)s")
            .expect("valid retry hint regex")
    })
}

/// Parses a `try again in 1h2m3.5s` style hint out of a provider message.
pub fn parse_retry_hint(message: &str) -> Option<Duration> {
    let caps = retry_hint_pattern().captures(message)?;
    let part = |idx: usize| -> f64 {
        caps.get(idx)
            .and_then(|m| m.as_str().parse::<f64>().ok())
            .unwrap_or(0.0)
    };
    let secs = part(1) * 3600.0 + part(2) * 60.0 + part(3);
    Duration::try_from_secs_f64(secs).ok()
}

/// Cooldown for a failed credential: the hint in the message, then the
/// provider's retry-after value, then `default`. Capped at
/// `MAX_COOLDOWN_SECS`.
pub fn cooldown_for(err: &ProviderError, default: Duration) -> Duration {
    parse_retry_hint(&err.message)
        .or(err.retry_after)
        .unwrap_or(default)
        .min(Duration::from_secs(MAX_COOLDOWN_SECS))
}

/// Round-robin over credentials, parking rate-limited ones until their
/// cooldown elapses.
pub struct CredentialRotor<B: ChatBackend, C: Clock = SystemClock> {
    backend: B,
    clock: C,
    credentials: Vec<Credential>,
    active: VecDeque<usize>,
    cooling: BTreeMap<usize, Instant>,
    default_cooldown: Duration,
    audit_log: Option<PathBuf>,
}

impl<B: ChatBackend> CredentialRotor<B, SystemClock> {
    pub fn new(backend: B, credentials: Vec<Credential>, default_cooldown: Duration) -> Self {
        Self::with_clock(backend, credentials, default_cooldown, SystemClock)
    }
}

impl<B: ChatBackend, C: Clock> CredentialRotor<B, C> {
    pub fn with_clock(
        backend: B,
        credentials: Vec<Credential>,
        default_cooldown: Duration,
        clock: C,
    ) -> Self {
        Self {
            backend,
            clock,
            active: (0..credentials.len()).collect(),
            credentials,
            cooling: BTreeMap::new(),
            default_cooldown,
            audit_log: None,
        }
    }

    pub fn with_audit_log(mut self, path: PathBuf) -> Self {
        self.audit_log = Some(path);
        self
    }

    /// Labels of the credentials in current rotation order.
    pub fn active_labels(&self) -> Vec<String> {
        self.active
            .iter()
            .map(|&idx| self.credentials[idx].label())
            .collect()
    }

    pub fn cooling_count(&self) -> usize {
        self.cooling.len()
    }

    fn restore_cooled_down(&mut self) {
        let now = self.clock.now();
        let mut expired = self
            .cooling
            .iter()
            .filter(|(_, until)| **until <= now)
            .map(|(&idx, &until)| (until, idx))
            .collect::<Vec<_>>();
        expired.sort();
        for (_, idx) in expired {
            self.cooling.remove(&idx);
            self.active.push_back(idx);
        }
    }

    fn park(&mut self, idx: usize, err: &ProviderError) {
        let cooldown = cooldown_for(err, self.default_cooldown);
        let now = self.clock.now();
        let until = now
            .checked_add(cooldown)
            .or_else(|| now.checked_add(self.default_cooldown))
            .unwrap_or(now);
        self.cooling.insert(idx, until);

        let label = self.credentials[idx].label();
        let retry_at = chrono::Local::now()
            + chrono::Duration::from_std(cooldown).unwrap_or_else(|_| chrono::Duration::zero());
        let reason = format!(
            "{label} cooling {}s until {}: {}",
            cooldown.as_secs(),
            retry_at.format("%H:%M:%S"),
            err.message
        );
        warn::emit(&WarnEvent {
            code: "COOLDOWN",
            stage: "request",
            action: "rotate",
            position: "na",
            reason: &reason,
        });
        if let Some(log) = &self.audit_log
            && let Err(audit_err) = audit::append_event(log, "cooldown", "warn", &reason)
        {
            warn::emit(&WarnEvent {
                code: "AUDIT_WRITE",
                stage: "request",
                action: "continue",
                position: "na",
                reason: &audit_err.to_string(),
            });
        }
    }

    /// Tries each active credential once, in rotation order.
    pub fn try_chat(
        &mut self,
        messages: &[ChatMessage],
        temperature: f64,
    ) -> Result<String, RotorError> {
        if self.credentials.is_empty() {
            return Err(RotorError::NoCredentials);
        }
        self.restore_cooled_down();

        for _ in 0..self.active.len() {
            let Some(idx) = self.active.pop_front() else {
                break;
            };
            match self
                .backend
                .complete(&self.credentials[idx], messages, temperature)
            {
                Ok(text) => {
                    self.active.push_back(idx);
                    return Ok(text);
                }
                Err(err) => self.park(idx, &err),
            }
        }

        Err(RotorError::AllCoolingDown {
            total: self.credentials.len(),
            cooling: self.cooling.len(),
        })
    }
}

impl<B: ChatBackend, C: Clock> ChatClient for CredentialRotor<B, C> {
    fn chat(&mut self, messages: &[ChatMessage], temperature: f64) -> anyhow::Result<String> {
        Ok(self.try_chat(messages, temperature)?)
    }
}

#[cfg(test)]
mod tests {
    use super::{
        ChatBackend, ChatMessage, Clock, Credential, CredentialRotor, MAX_COOLDOWN_SECS,
        cooldown_for, parse_retry_hint,
    };
    use crate::error::{ProviderError, RotorError};
    use std::cell::{Cell, RefCell};
    use std::collections::{HashMap, VecDeque};
    use std::rc::Rc;
    use std::time::{Duration, Instant};

    #[derive(Clone)]
    struct ManualClock(Rc<Cell<Instant>>);

    impl ManualClock {
        fn new() -> Self {
            Self(Rc::new(Cell::new(Instant::now())))
        }

        fn advance(&self, by: Duration) {
            self.0.set(self.0.get() + by);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            self.0.get()
        }
    }

    #[derive(Default)]
    struct ScriptedBackend {
        replies: RefCell<HashMap<String, VecDeque<Result<String, ProviderError>>>>,
        calls: RefCell<Vec<String>>,
    }

    impl ScriptedBackend {
        fn push(&self, key: &str, reply: Result<&str, &str>) {
            self.replies
                .borrow_mut()
                .entry(key.to_string())
                .or_default()
                .push_back(reply.map(str::to_string).map_err(ProviderError::new));
        }
    }

    impl ChatBackend for Rc<ScriptedBackend> {
        fn complete(
            &self,
            credential: &Credential,
            _messages: &[ChatMessage],
            _temperature: f64,
        ) -> Result<String, ProviderError> {
            self.calls.borrow_mut().push(credential.key.clone());
            self.replies
                .borrow_mut()
                .get_mut(&credential.key)
                .and_then(VecDeque::pop_front)
                .unwrap_or_else(|| Ok(format!("reply from {}", credential.key)))
        }
    }

    fn credential(key: &str) -> Credential {
        Credential {
            provider: "groq".to_string(),
            model: "llama".to_string(),
            base_url: "http://127.0.0.1:9".to_string(),
            key: key.to_string(),
        }
    }

    fn messages() -> Vec<ChatMessage> {
        vec![ChatMessage::user("Ahoj")]
    }

    #[test]
    fn parses_retry_hints() {
        assert_eq!(
            parse_retry_hint("Rate limit reached. Please try again in 2m30s."),
            Some(Duration::from_secs(150))
        );
        assert_eq!(
            parse_retry_hint("try again in 7.5s"),
            Some(Duration::from_millis(7500))
        );
        assert_eq!(
            parse_retry_hint("try again in 1h0m1s"),
            Some(Duration::from_secs(3601))
        );
        assert_eq!(parse_retry_hint("quota exceeded"), None);
    }

    #[test]
    fn cooldown_prefers_message_then_header_then_default() {
        let default = Duration::from_secs(600);
        let hinted = ProviderError::new("try again in 1m0s")
            .with_retry_after(Some(Duration::from_secs(5)));
        assert_eq!(cooldown_for(&hinted, default), Duration::from_secs(60));
        let header = ProviderError::new("429").with_retry_after(Some(Duration::from_secs(5)));
        assert_eq!(cooldown_for(&header, default), Duration::from_secs(5));
        assert_eq!(cooldown_for(&ProviderError::new("boom"), default), default);
    }

    #[test]
    fn rate_limited_credential_returns_after_its_cooldown() {
        let backend = Rc::new(ScriptedBackend::default());
        backend.push("A", Err("Rate limit reached. Please try again in 2m30s."));
        let clock = ManualClock::new();
        let mut rotor = CredentialRotor::with_clock(
            Rc::clone(&backend),
            vec![credential("A"), credential("B")],
            Duration::from_secs(600),
            clock.clone(),
        );

        assert_eq!(rotor.try_chat(&messages(), 0.4).expect("B answers"), "reply from B");
        assert_eq!(*backend.calls.borrow(), vec!["A", "B"]);
        assert_eq!(rotor.cooling_count(), 1);

        clock.advance(Duration::from_secs(149));
        rotor.try_chat(&messages(), 0.4).expect("still B");
        assert_eq!(rotor.cooling_count(), 1);

        clock.advance(Duration::from_secs(1));
        rotor.try_chat(&messages(), 0.4).expect("B again, A reinstated behind it");
        assert_eq!(rotor.cooling_count(), 0);
        assert_eq!(*backend.calls.borrow(), vec!["A", "B", "B", "B"]);

        rotor.try_chat(&messages(), 0.4).expect("A's turn");
        assert_eq!(backend.calls.borrow().last().map(String::as_str), Some("A"));
    }

    #[test]
    fn oversized_retry_hint_is_capped() {
        let backend = Rc::new(ScriptedBackend::default());
        backend.push(
            "A",
            Err("Rate limit reached. Please try again in 10000000000000000000s."),
        );
        let clock = ManualClock::new();
        let mut rotor = CredentialRotor::with_clock(
            Rc::clone(&backend),
            vec![credential("A"), credential("B")],
            Duration::from_secs(600),
            clock.clone(),
        );

        assert_eq!(rotor.try_chat(&messages(), 0.4).expect("B answers"), "reply from B");
        assert_eq!(rotor.cooling_count(), 1);

        clock.advance(Duration::from_secs(MAX_COOLDOWN_SECS));
        rotor.try_chat(&messages(), 0.4).expect("B again");
        assert_eq!(rotor.cooling_count(), 0);
        rotor.try_chat(&messages(), 0.4).expect("A back in rotation");
        assert_eq!(backend.calls.borrow().last().map(String::as_str), Some("A"));

        let header = ProviderError::new("429").with_retry_after(Some(Duration::MAX));
        assert_eq!(
            cooldown_for(&header, Duration::from_secs(600)),
            Duration::from_secs(MAX_COOLDOWN_SECS)
        );
    }

    #[test]
    fn success_rotates_credential_to_the_back() {
        let backend = Rc::new(ScriptedBackend::default());
        let mut rotor = CredentialRotor::new(
            Rc::clone(&backend),
            vec![credential("A"), credential("B"), credential("C")],
            Duration::from_secs(600),
        );
        for _ in 0..4 {
            rotor.try_chat(&messages(), 0.4).expect("reply");
        }
        assert_eq!(*backend.calls.borrow(), vec!["A", "B", "C", "A"]);
    }

    #[test]
    fn fails_once_every_credential_is_cooling_down() {
        let backend = Rc::new(ScriptedBackend::default());
        backend.push("A", Err("503"));
        backend.push("B", Err("503"));
        let mut rotor = CredentialRotor::with_clock(
            Rc::clone(&backend),
            vec![credential("A"), credential("B")],
            Duration::from_secs(600),
            ManualClock::new(),
        );

        let err = rotor.try_chat(&messages(), 0.4).expect_err("all fail");
        assert!(matches!(
            err,
            RotorError::AllCoolingDown {
                total: 2,
                cooling: 2
            }
        ));
        assert_eq!(backend.calls.borrow().len(), 2);

        rotor.try_chat(&messages(), 0.4).expect_err("nothing active");
        assert_eq!(backend.calls.borrow().len(), 2);
    }

    #[test]
    fn empty_rotor_reports_missing_credentials() {
        let mut rotor = CredentialRotor::new(
            Rc::new(ScriptedBackend::default()),
            Vec::new(),
            Duration::from_secs(600),
        );
        assert!(matches!(
            rotor.try_chat(&messages(), 0.4),
            Err(RotorError::NoCredentials)
        ));
    }

    #[test]
    fn debug_output_hides_the_key() {
        let rendered = format!("{:?}", credential("gsk_very_secret"));
        assert!(!rendered.contains("gsk_very_secret"));
    }
}
