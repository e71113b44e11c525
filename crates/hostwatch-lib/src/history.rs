//! Bounded sample history
//!
//! Keeps the CPU, memory and disk histories in lockstep with their
//! timestamps. The analytics core never holds on to this buffer; it only
//! reads the metric slices handed to it on each tick.

use crate::models::{MetricKind, Sample};
use chrono::{DateTime, Utc};

/// Default retained length (1 hour at 1 Hz)
pub const DEFAULT_MAX_HISTORY: usize = 3600;

/// Parallel bounded histories for the three metrics
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    cpu: Vec<f64>,
    memory: Vec<f64>,
    disk: Vec<f64>,
    timestamps: Vec<DateTime<Utc>>,
    capacity: usize,
    total_samples: usize,
}

impl SampleBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            cpu: Vec::with_capacity(capacity.min(DEFAULT_MAX_HISTORY)),
            memory: Vec::with_capacity(capacity.min(DEFAULT_MAX_HISTORY)),
            disk: Vec::with_capacity(capacity.min(DEFAULT_MAX_HISTORY)),
            timestamps: Vec::with_capacity(capacity.min(DEFAULT_MAX_HISTORY)),
            capacity,
            total_samples: 0,
        }
    }

    /// Append a sample, evicting the oldest entries past capacity
    pub fn push(&mut self, sample: Sample) {
        self.cpu.push(sample.cpu_percent);
        self.memory.push(sample.memory_percent);
        self.disk.push(sample.disk_percent);
        self.timestamps.push(sample.timestamp);
        self.total_samples += 1;

        if self.timestamps.len() > self.capacity {
            let excess = self.timestamps.len() - self.capacity;
            self.cpu.drain(0..excess);
            self.memory.drain(0..excess);
            self.disk.drain(0..excess);
            self.timestamps.drain(0..excess);
        }
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Samples ever pushed, including evicted ones
    pub fn total_samples(&self) -> usize {
        self.total_samples
    }

    pub fn cpu_history(&self) -> &[f64] {
        &self.cpu
    }

    pub fn mem_history(&self) -> &[f64] {
        &self.memory
    }

    pub fn disk_history(&self) -> &[f64] {
        &self.disk
    }

    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    pub fn latest(&self) -> Option<Sample> {
        let idx = self.len().checked_sub(1)?;
        Some(Sample::at(
            self.timestamps[idx],
            self.cpu[idx],
            self.memory[idx],
            self.disk[idx],
        ))
    }

    /// The most recent `limit` samples, oldest first
    pub fn recent(&self, limit: usize) -> Vec<Sample> {
        let start = self.len().saturating_sub(limit);
        (start..self.len())
            .map(|i| Sample::at(self.timestamps[i], self.cpu[i], self.memory[i], self.disk[i]))
            .collect()
    }
}

impl Default for SampleBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HISTORY)
    }
}

/// Three metric histories truncated to a common length
///
/// Callers may hand over sequences of slightly different lengths when a
/// sample is appended mid-read. Every sequence is cut to the shortest one,
/// keeping the oldest aligned prefix so index `i` refers to the same tick
/// in all three.
#[derive(Debug, Clone, Copy)]
pub struct AlignedHistory<'a> {
    pub cpu: &'a [f64],
    pub memory: &'a [f64],
    pub disk: &'a [f64],
}

impl<'a> AlignedHistory<'a> {
    pub fn new(cpu: &'a [f64], memory: &'a [f64], disk: &'a [f64]) -> Self {
        let len = cpu.len().min(memory.len()).min(disk.len());
        Self {
            cpu: &cpu[..len],
            memory: &memory[..len],
            disk: &disk[..len],
        }
    }

    pub fn len(&self) -> usize {
        self.cpu.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cpu.is_empty()
    }

    pub fn metric(&self, metric: MetricKind) -> &'a [f64] {
        match metric {
            MetricKind::Cpu => self.cpu,
            MetricKind::Memory => self.memory,
            MetricKind::Disk => self.disk,
        }
    }

    /// Keep only the most recent `window` ticks
    pub fn tail(&self, window: usize) -> Self {
        let start = self.len().saturating_sub(window);
        Self {
            cpu: &self.cpu[start..],
            memory: &self.memory[start..],
            disk: &self.disk[start..],
        }
    }

    pub fn row(&self, idx: usize) -> Option<[f64; 3]> {
        if idx >= self.len() {
            return None;
        }
        Some([self.cpu[idx], self.memory[idx], self.disk[idx]])
    }

    pub fn last_row(&self) -> Option<[f64; 3]> {
        self.len().checked_sub(1).and_then(|idx| self.row(idx))
    }

    pub fn rows(&self) -> impl Iterator<Item = [f64; 3]> + 'a {
        let (cpu, memory, disk) = (self.cpu, self.memory, self.disk);
        (0..cpu.len()).map(move |i| [cpu[i], memory[i], disk[i]])
    }
}

impl<'a> From<&'a SampleBuffer> for AlignedHistory<'a> {
    fn from(buffer: &'a SampleBuffer) -> Self {
        AlignedHistory::new(buffer.cpu_history(), buffer.mem_history(), buffer.disk_history())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_keeps_sequences_aligned() {
        let mut buffer = SampleBuffer::new(10);
        for i in 0..5 {
            buffer.push(Sample::new(i as f64, 50.0, 60.0));
        }

        assert_eq!(buffer.len(), 5);
        assert_eq!(buffer.cpu_history().len(), buffer.mem_history().len());
        assert_eq!(buffer.disk_history().len(), buffer.timestamps().len());
        assert_eq!(buffer.latest().unwrap().cpu_percent, 4.0);
    }

    #[test]
    fn test_eviction_past_capacity() {
        let mut buffer = SampleBuffer::new(3);
        for i in 0..10 {
            buffer.push(Sample::new(i as f64, 0.0, 0.0));
        }

        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.cpu_history(), &[7.0, 8.0, 9.0]);
        // Total keeps counting past the cap so the retrain cadence still advances
        assert_eq!(buffer.total_samples(), 10);
    }

    #[test]
    fn test_recent_returns_oldest_first() {
        let mut buffer = SampleBuffer::new(100);
        for i in 0..20 {
            buffer.push(Sample::new(i as f64, 0.0, 0.0));
        }

        let recent = buffer.recent(3);
        let cpu: Vec<f64> = recent.iter().map(|s| s.cpu_percent).collect();
        assert_eq!(cpu, vec![17.0, 18.0, 19.0]);
    }

    #[test]
    fn test_aligned_history_truncates_to_shortest() {
        let cpu = [1.0, 2.0, 3.0, 4.0];
        let mem = [10.0, 20.0, 30.0];
        let disk = [5.0, 6.0, 7.0, 8.0, 9.0];

        let aligned = AlignedHistory::new(&cpu, &mem, &disk);
        assert_eq!(aligned.len(), 3);
        assert_eq!(aligned.last_row(), Some([3.0, 30.0, 7.0]));
    }

    #[test]
    fn test_aligned_tail() {
        let values: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let aligned = AlignedHistory::new(&values, &values, &values).tail(4);

        assert_eq!(aligned.cpu, &[6.0, 7.0, 8.0, 9.0]);
        assert_eq!(aligned.rows().count(), 4);
    }

    #[test]
    fn test_empty_history() {
        let aligned = AlignedHistory::new(&[], &[1.0], &[2.0]);
        assert!(aligned.is_empty());
        assert_eq!(aligned.last_row(), None);
    }
}
