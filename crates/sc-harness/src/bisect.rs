//! Decides whether a failure belongs to the active stage or was inherited.
//!
//! When bisection is on, the previous stage is checked first. If it already
//! fails, the active stage is not blamed and its tests are skipped.

use std::cell::OnceCell;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::context::ActiveStageContext;
use crate::env;
use crate::stage::Stage;

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Answers "did this stage fail?" for the stage before the active one.
pub trait PredecessorOracle {
    fn predecessor_failed(&self, predecessor: &Stage) -> bool;
}

impl<F> PredecessorOracle for F
where
    F: Fn(&Stage) -> bool,
{
    fn predecessor_failed(&self, predecessor: &Stage) -> bool {
        self(predecessor)
    }
}

/// Replays the whole test program with the predecessor selected.
///
/// The child inherits the environment with the stage variable pointing at
/// the predecessor and bisection turned off, so replay never recurses.
/// Its output is discarded; a zero exit status means every test passed.
#[derive(Debug, Clone)]
pub struct SubprocessOracle {
    program: PathBuf,
    args: Vec<OsString>,
    timeout: Option<Duration>,
}

impl SubprocessOracle {
    pub fn new(program: impl Into<PathBuf>, args: Vec<OsString>) -> Self {
        SubprocessOracle {
            program: program.into(),
            args,
            timeout: None,
        }
    }

    /// Re-runs the current executable with the current arguments.
    pub fn current_process() -> Self {
        // An empty path fails to spawn, which counts as a failed predecessor.
        let program = std::env::current_exe().unwrap_or_default();
        Self::new(program, std::env::args_os().skip(1).collect())
    }

    /// Kill the child and treat the predecessor as failed after `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn spawn(&self, predecessor: &Stage) -> std::io::Result<Child> {
        Command::new(&self.program)
            .args(&self.args)
            .env(env::STAGE_VAR, predecessor.name())
            .env(env::DIFF_VAR, "0")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
    }

    fn wait(&self, child: &mut Child) -> std::io::Result<Option<ExitStatus>> {
        let Some(limit) = self.timeout else {
            return child.wait().map(Some);
        };
        let start = Instant::now();
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(Some(status));
            }
            if start.elapsed() >= limit {
                let _ = child.kill();
                let _ = child.wait();
                return Ok(None);
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }
}

impl PredecessorOracle for SubprocessOracle {
    fn predecessor_failed(&self, predecessor: &Stage) -> bool {
        let mut child = match self.spawn(predecessor) {
            Ok(child) => child,
            Err(err) => {
                warn!(
                    program = %self.program.display(),
                    %err,
                    "could not spawn replay; treating predecessor as failed"
                );
                return true;
            }
        };
        debug!(pid = child.id(), stage = predecessor.name(), "replaying predecessor");
        match self.wait(&mut child) {
            Ok(Some(status)) => {
                debug!(stage = predecessor.name(), %status, "replay finished");
                !status.success()
            }
            Ok(None) => {
                warn!(
                    stage = predecessor.name(),
                    timeout = ?self.timeout,
                    "replay timed out; treating predecessor as failed"
                );
                true
            }
            Err(err) => {
                warn!(
                    stage = predecessor.name(),
                    %err,
                    "lost track of replay; treating predecessor as failed"
                );
                true
            }
        }
    }
}

/// Asks the oracle about the predecessor at most once per process.
#[derive(Debug)]
pub struct RegressionBisector<O> {
    oracle: O,
    memo: OnceCell<bool>,
}

impl<O: PredecessorOracle> RegressionBisector<O> {
    pub fn new(oracle: O) -> Self {
        RegressionBisector {
            oracle,
            memo: OnceCell::new(),
        }
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    /// `false` without consulting the oracle when bisection is off or the
    /// active stage has no predecessor.
    pub fn predecessor_failed(&self, ctx: &ActiveStageContext) -> bool {
        if !ctx.diff_enabled() {
            return false;
        }
        let Some(predecessor) = ctx.predecessor() else {
            return false;
        };
        *self.memo.get_or_init(|| {
            let failed = self.oracle.predecessor_failed(predecessor);
            info!(predecessor = predecessor.name(), failed, "bisection");
            failed
        })
    }
}
