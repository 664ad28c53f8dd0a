//! Line statistics job used by the `run` subcommand
//!
//! Lines are dealt round-robin to `tasks` partitions. Every task reports:
//!
//! - `num-lines` and `num-chars` ([`LongCounter`])
//! - `words-per-line` ([`Histogram`])
//! - `line-length` ([`Average`])
//! - `longest-line` ([`LongMaximum`])

use crate::accumulator::{Average, Histogram, LongCounter, LongMaximum};
use crate::task::{TaskContext, TaskFunction};
use crate::types::TaskId;
use anyhow::bail;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;

pub const NUM_LINES: &str = "num-lines";
pub const NUM_CHARS: &str = "num-chars";
pub const WORDS_PER_LINE: &str = "words-per-line";
pub const LINE_LENGTH: &str = "line-length";
pub const LONGEST_LINE: &str = "longest-line";

/// Input shared by all tasks of a line statistics job
#[derive(Debug, Clone)]
pub struct LineStatsPlan {
    lines: Arc<Vec<String>>,
    tasks: usize,
    fail_first: Arc<HashSet<u32>>,
}

impl LineStatsPlan {
    pub fn new(text: &str, tasks: usize) -> Self {
        Self {
            lines: Arc::new(text.lines().map(str::to_string).collect()),
            tasks: tasks.max(1),
            fail_first: Arc::new(HashSet::new()),
        }
    }

    pub fn with_failing_first_attempts(mut self, tasks: impl IntoIterator<Item = u32>) -> Self {
        self.fail_first = Arc::new(tasks.into_iter().collect());
        self
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Task logic for `task_id`
    pub fn task(&self, task_id: TaskId) -> LineStats {
        LineStats {
            plan: self.clone(),
            partition: task_id.index() as usize,
        }
    }

    fn partition(&self, index: usize) -> impl Iterator<Item = &str> {
        self.lines
            .iter()
            .skip(index)
            .step_by(self.tasks)
            .map(String::as_str)
    }
}

/// One task of a line statistics job
#[derive(Debug)]
pub struct LineStats {
    plan: LineStatsPlan,
    partition: usize,
}

#[async_trait]
impl TaskFunction for LineStats {
    async fn open(&mut self, ctx: &mut TaskContext) -> anyhow::Result<()> {
        ctx.register(NUM_LINES, LongCounter::new())?;
        ctx.register(NUM_CHARS, LongCounter::new())?;
        ctx.register(WORDS_PER_LINE, Histogram::new())?;
        ctx.register(LINE_LENGTH, Average::default())?;
        ctx.register(LONGEST_LINE, LongMaximum::default())?;
        Ok(())
    }

    async fn process(&mut self, ctx: &mut TaskContext) -> anyhow::Result<()> {
        let lines = ctx.accumulator::<LongCounter>(NUM_LINES)?;
        let chars = ctx.accumulator::<LongCounter>(NUM_CHARS)?;
        let words = ctx.accumulator::<Histogram>(WORDS_PER_LINE)?;
        let length = ctx.accumulator::<Average>(LINE_LENGTH)?;
        let longest = ctx.accumulator::<LongMaximum>(LONGEST_LINE)?;

        for line in self.plan.partition(self.partition) {
            let len = line.chars().count() as i64;
            lines.add(1);
            chars.add(len);
            words.add(line.split_whitespace().count().min(i32::MAX as usize) as i32);
            length.add(len as f64);
            longest.add(len);
        }

        let attempt = ctx.attempt();
        if attempt.attempt == 1 && self.plan.fail_first.contains(&attempt.task_id.index()) {
            bail!("{} was asked to fail its first attempt", attempt.task_id);
        }
        Ok(())
    }
}
