//! Admission-number policies and ordering.

use std::cmp::Ordering;

use scholaris_core::error::ScholarisResult;
use scholaris_core::models::student::Student;
use scholaris_core::repository::AdmissionCounterRepository;
use uuid::Uuid;

use crate::config::EngineConfig;

/// Chooses the admission number a promoted student gets in the target
/// session when the source number is not preserved.
///
/// Implementations must be deterministic for a given store state and
/// must never hand out the same number twice within a session.
pub trait AdmissionNumberPolicy: Send + Sync {
    fn assign(
        &self,
        tenant_id: Uuid,
        target_session_id: Uuid,
        source: &Student,
    ) -> impl Future<Output = ScholarisResult<String>> + Send;
}

/// Reuses the source record's admission number.
#[derive(Debug, Clone, Copy, Default)]
pub struct PreserveAdmissionNumbers;

impl AdmissionNumberPolicy for PreserveAdmissionNumbers {
    async fn assign(
        &self,
        _tenant_id: Uuid,
        _target_session_id: Uuid,
        source: &Student,
    ) -> ScholarisResult<String> {
        Ok(source.admission_no.clone())
    }
}

/// Draws from a per-session counter and formats `{prefix}{seq:0width}`.
#[derive(Clone)]
pub struct SequentialAdmissionNumbers<R: AdmissionCounterRepository> {
    counter: R,
    prefix: String,
    width: usize,
}

impl<R: AdmissionCounterRepository> SequentialAdmissionNumbers<R> {
    pub fn new(counter: R, config: &EngineConfig) -> Self {
        Self {
            counter,
            prefix: config.admission_number_prefix.clone(),
            width: config.admission_number_width,
        }
    }

    fn format(&self, seq: u64) -> String {
        format!("{}{:0width$}", self.prefix, seq, width = self.width)
    }
}

impl<R: AdmissionCounterRepository> AdmissionNumberPolicy for SequentialAdmissionNumbers<R> {
    async fn assign(
        &self,
        tenant_id: Uuid,
        target_session_id: Uuid,
        _source: &Student,
    ) -> ScholarisResult<String> {
        let seq = self.counter.next_value(tenant_id, target_session_id).await?;
        Ok(self.format(seq))
    }
}

/// Compare admission numbers so that digit runs order numerically:
/// `"2" < "10"`, `"A-9" < "A-10"`. Ties fall back to plain string order.
pub fn compare_admission_numbers(a: &str, b: &str) -> Ordering {
    let mut left = Chunks(a);
    let mut right = Chunks(b);
    loop {
        match (left.next(), right.next()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                let ord = match (is_digits(x), is_digits(y)) {
                    (true, true) => compare_digit_runs(x, y),
                    _ => x.cmp(y),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

fn is_digits(chunk: &str) -> bool {
    chunk.as_bytes().first().is_some_and(u8::is_ascii_digit)
}

fn compare_digit_runs(x: &str, y: &str) -> Ordering {
    let x = x.trim_start_matches('0');
    let y = y.trim_start_matches('0');
    x.len().cmp(&y.len()).then_with(|| x.cmp(y))
}

/// Splits a string into alternating runs of ASCII digits and non-digits.
struct Chunks<'a>(&'a str);

impl<'a> Iterator for Chunks<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let first = self.0.chars().next()?;
        let digit = first.is_ascii_digit();
        let end = self
            .0
            .char_indices()
            .find(|(_, c)| c.is_ascii_digit() != digit)
            .map_or(self.0.len(), |(i, _)| i);
        let (chunk, rest) = self.0.split_at(end);
        self.0 = rest;
        Some(chunk)
    }
}
