//! Editor session
//!
//! [`EditorSession`] owns the documents behind one deployment form and
//! drives them through the session state machine:
//!
//! - loading values or a schema parses, then re-extracts parameters
//! - field edits are buffered in a [`CommitQueue`] and committed when their
//!   delay elapses ([`tick`](EditorSession::tick)) or on an eager
//!   [`FlushTrigger`]
//! - each commit rewrites the current values text, then re-extracts
//!
//! A failed parse returns the session to `Idle`, records the error and
//! clears the parameter list. Extraction is skipped when no input changed.

use crate::apply::Applier;
use crate::config::ReconcileConfig;
use crate::error::SessionError;
use crate::extract::{filter_parameters, EditableParameter, Extractor, Sources};
use crate::queue::{CommitQueue, FlushTrigger};
use crate::state_machine::{validate_transition, SessionState};
use crate::validate::{ValidationIssue, Validator};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info, warn};
use valform_document::{SchemaDocument, ValuesDocument};
use valform_model::{ContentHash, DeploymentEvent, KeyPath, ScalarEdit};

/// Which values document a text replaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValuesSource {
    /// The user's working values
    Current,
    /// Defaults shipped with the selected package version
    Defaults,
    /// Values of the deployed release
    Deployed,
}

/// Payload handed to the deployment API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentRequest {
    /// Committed values text
    pub values: String,
    /// Current schema object, if one is loaded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<serde_json::Value>,
    pub event: DeploymentEvent,
}

/// Hashes of every extraction input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Fingerprint {
    schema: ContentHash,
    current: ContentHash,
    defaults: Option<ContentHash>,
    deployed: Option<ContentHash>,
}

/// State of one values/schema form
#[derive(Debug)]
pub struct EditorSession {
    state: SessionState,
    event: DeploymentEvent,
    extractor: Extractor,
    applier: Applier,
    queue: CommitQueue,
    current: ValuesDocument,
    defaults: Option<ValuesDocument>,
    deployed: Option<ValuesDocument>,
    schema: Option<SchemaDocument>,
    validator: Option<Validator>,
    parameters: Vec<EditableParameter>,
    issues: Vec<ValidationIssue>,
    extracted_from: Option<Fingerprint>,
    last_error: Option<SessionError>,
}

impl EditorSession {
    #[must_use]
    pub fn new(config: ReconcileConfig, event: DeploymentEvent) -> Self {
        let applier = Applier::new(config.indent_step);
        Self {
            state: SessionState::Idle,
            event,
            queue: CommitQueue::new(config.commit_delay()),
            current: applier.prepare(ValuesDocument::empty()),
            applier,
            extractor: Extractor::new(config),
            defaults: None,
            deployed: None,
            schema: None,
            validator: None,
            parameters: Vec::new(),
            issues: Vec::new(),
            extracted_from: None,
            last_error: None,
        }
    }

    /// Replace one values document with parsed text
    ///
    /// Loading the current values discards buffered edits.
    ///
    /// # Errors
    /// - `SessionError::Parse` if the text is not a single YAML document
    /// - `SessionError::IllegalTransition` if the session is busy
    pub fn load_values(&mut self, source: ValuesSource, text: &str) -> Result<(), SessionError> {
        self.transition(SessionState::ParsingValues)?;
        let doc = match ValuesDocument::parse(text) {
            Ok(doc) => self.applier.prepare(doc),
            Err(err) => return Err(self.fail(err.into(), true)),
        };
        debug!(?source, hash = %doc.hash().short(), "loaded values");
        match source {
            ValuesSource::Current => {
                let dropped = self.queue.discard();
                if dropped > 0 {
                    debug!(dropped, "discarded buffered edits");
                }
                self.current = doc;
            }
            ValuesSource::Defaults => self.defaults = Some(doc),
            ValuesSource::Deployed => self.deployed = Some(doc),
        }
        self.extract()
    }

    /// Replace the schema with a parsed object
    ///
    /// # Errors
    /// - `SessionError::Parse` if the value is not a JSON object
    /// - `SessionError::IllegalTransition` if the session is busy
    pub fn load_schema(&mut self, schema: serde_json::Value) -> Result<(), SessionError> {
        self.transition(SessionState::ParsingSchema)?;
        let parsed = SchemaDocument::from_value(schema);
        self.install_schema(parsed)
    }

    /// Replace the schema with JSON text; blank text is the empty schema
    ///
    /// # Errors
    /// - `SessionError::Parse` for malformed JSON or a non-object schema
    /// - `SessionError::IllegalTransition` if the session is busy
    pub fn load_schema_text(&mut self, text: &str) -> Result<(), SessionError> {
        self.transition(SessionState::ParsingSchema)?;
        let parsed = SchemaDocument::from_json_str(text);
        self.install_schema(parsed)
    }

    fn install_schema(
        &mut self,
        parsed: Result<SchemaDocument, valform_document::ParseError>,
    ) -> Result<(), SessionError> {
        let schema = match parsed {
            Ok(schema) => schema,
            Err(err) => return Err(self.fail(err.into(), true)),
        };
        self.validator = match Validator::new(&schema) {
            Ok(validator) => Some(validator),
            Err(err) => {
                warn!(error = %err, "schema does not compile, values will not be validated");
                None
            }
        };
        debug!(hash = %schema.hash().short(), "loaded schema");
        self.schema = Some(schema);
        self.extract()
    }

    /// Buffer a field edit made at `now`
    pub fn edit(&mut self, edit: ScalarEdit, now: Instant) {
        self.queue.push(edit, now);
    }

    /// Commit edits whose delay has elapsed at `now`
    ///
    /// # Errors
    /// Returns `SessionError::Apply` if an edit cannot be written; the values
    /// text is left unchanged and the due edits are dropped.
    pub fn tick(&mut self, now: Instant) -> Result<usize, SessionError> {
        let due = self.queue.take_due(now);
        if due.is_empty() {
            return Ok(0);
        }
        self.commit(&due, FlushTrigger::Timer)
    }

    /// Commit every buffered edit now
    ///
    /// # Errors
    /// As [`tick`](Self::tick).
    pub fn flush(&mut self, trigger: FlushTrigger) -> Result<usize, SessionError> {
        let edits = self.queue.flush();
        if edits.is_empty() {
            return Ok(0);
        }
        self.commit(&edits, trigger)
    }

    /// Drop the buffered edit for one field
    pub fn cancel_pending(&mut self, key: &KeyPath) -> Option<ScalarEdit> {
        self.queue.cancel_pending(key)
    }

    /// Discard buffered edits and reset the current values to the package defaults
    ///
    /// # Errors
    /// Returns `SessionError::IllegalTransition` if the session is busy.
    pub fn restore_defaults(&mut self) -> Result<(), SessionError> {
        self.transition(SessionState::ParsingValues)?;
        let dropped = self.queue.discard();
        self.current = self
            .defaults
            .clone()
            .unwrap_or_else(|| self.applier.prepare(ValuesDocument::empty()));
        info!(dropped, "restored default values");
        self.extract()
    }

    /// Flush buffered edits, then keep parameters matching `query`
    ///
    /// # Errors
    /// As [`flush`](Self::flush).
    pub fn search(&mut self, query: &str) -> Result<Vec<&EditableParameter>, SessionError> {
        self.flush(FlushTrigger::Search)?;
        Ok(filter_parameters(&self.parameters, query))
    }

    /// Recompute validation issues for the current values
    ///
    /// # Errors
    /// Returns `SessionError::NoSchema` if no schema is loaded.
    pub fn revalidate(&mut self) -> Result<&[ValidationIssue], SessionError> {
        if self.schema.is_none() {
            return Err(SessionError::NoSchema);
        }
        self.issues = self.compute_issues();
        Ok(&self.issues)
    }

    /// Flush buffered edits and build the deployment payload
    ///
    /// # Errors
    /// As [`flush`](Self::flush).
    pub fn submit(&mut self) -> Result<DeploymentRequest, SessionError> {
        self.flush(FlushTrigger::Submit)?;
        info!(event = %self.event, hash = %self.current.hash().short(), "submitting values");
        Ok(DeploymentRequest {
            values: self.current.as_str().to_string(),
            schema: self.schema.as_ref().map(|s| s.value().clone()),
            event: self.event,
        })
    }

    #[inline]
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[inline]
    #[must_use]
    pub fn event(&self) -> DeploymentEvent {
        self.event
    }

    #[inline]
    #[must_use]
    pub fn parameters(&self) -> &[EditableParameter] {
        &self.parameters
    }

    /// Committed values text; buffered edits are not included
    #[inline]
    #[must_use]
    pub fn values_text(&self) -> &str {
        self.current.as_str()
    }

    /// Canonical schema text, if a schema is loaded
    #[must_use]
    pub fn schema_text(&self) -> Option<&str> {
        self.schema.as_ref().map(SchemaDocument::as_str)
    }

    #[inline]
    #[must_use]
    pub fn issues(&self) -> &[ValidationIssue] {
        &self.issues
    }

    /// Error of the last failed operation, cleared by the next success
    #[inline]
    #[must_use]
    pub fn last_error(&self) -> Option<&SessionError> {
        self.last_error.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn pending(&self) -> &CommitQueue {
        &self.queue
    }

    fn commit(&mut self, edits: &[ScalarEdit], trigger: FlushTrigger) -> Result<usize, SessionError> {
        self.transition(SessionState::Committing)?;
        match self.applier.apply_batch(&mut self.current, edits) {
            Ok(applied) => {
                info!(%trigger, applied, "committed buffered edits");
                self.extract()?;
                Ok(applied)
            }
            Err(err) => Err(self.fail(err.into(), false)),
        }
    }

    /// Re-extract parameters unless every input is unchanged
    fn extract(&mut self) -> Result<(), SessionError> {
        self.transition(SessionState::Extracting)?;
        match &self.schema {
            Some(schema) => {
                let fingerprint = Fingerprint {
                    schema: schema.hash(),
                    current: self.current.hash(),
                    defaults: self.defaults.as_ref().map(ValuesDocument::hash),
                    deployed: self.deployed.as_ref().map(ValuesDocument::hash),
                };
                if self.extracted_from == Some(fingerprint) {
                    debug!("inputs unchanged, keeping parameters");
                } else {
                    let sources = Sources {
                        current: Some(&self.current),
                        defaults: self.defaults.as_ref(),
                        deployed: self.deployed.as_ref(),
                        event: self.event,
                    };
                    self.parameters = self.extractor.extract(schema, &sources);
                    self.extracted_from = Some(fingerprint);
                    self.issues = self.compute_issues();
                }
            }
            None => {
                self.parameters.clear();
                self.issues.clear();
                self.extracted_from = None;
            }
        }
        self.last_error = None;
        self.transition(SessionState::Idle)
    }

    fn compute_issues(&self) -> Vec<ValidationIssue> {
        self.validator
            .as_ref()
            .map(|validator| validator.check(&self.current))
            .unwrap_or_default()
    }

    fn transition(&mut self, to: SessionState) -> Result<(), SessionError> {
        validate_transition(self.state, to)?;
        debug!(from = %self.state, %to, "session transition");
        self.state = to;
        Ok(())
    }

    /// Record a failure and return to `Idle`
    fn fail(&mut self, err: SessionError, clear_parameters: bool) -> SessionError {
        warn!(state = %self.state, error = %err, "session operation failed");
        // Every state may return to Idle.
        self.state = SessionState::Idle;
        if clear_parameters {
            self.parameters.clear();
            self.issues.clear();
            self.extracted_from = None;
        }
        self.last_error = Some(err.clone());
        err
    }
}

impl Default for EditorSession {
    fn default() -> Self {
        Self::new(ReconcileConfig::default(), DeploymentEvent::default())
    }
}
