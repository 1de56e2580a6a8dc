use std::process::{Child, Command as ProcessCommand, ExitStatus};

use anyhow::{Context, Result};

#[cfg(unix)]
use anyhow::anyhow;
#[cfg(unix)]
use std::os::unix::process::CommandExt;

#[cfg(unix)]
struct ScopedSigaction {
    signum: libc::c_int,
    old_action: libc::sigaction,
}

#[cfg(unix)]
impl ScopedSigaction {
    fn ignore(signum: libc::c_int) -> Result<Self> {
        unsafe {
            let mut new_action: libc::sigaction = std::mem::zeroed();
            new_action.sa_sigaction = libc::SIG_IGN;
            libc::sigemptyset(&mut new_action.sa_mask);
            new_action.sa_flags = 0;

            let mut old_action: libc::sigaction = std::mem::zeroed();
            if libc::sigaction(signum, &new_action, &mut old_action) != 0 {
                return Err(anyhow!("failed to update signal action for {signum}"));
            }

            Ok(Self { signum, old_action })
        }
    }
}

#[cfg(unix)]
impl Drop for ScopedSigaction {
    fn drop(&mut self) {
        unsafe {
            let _ = libc::sigaction(self.signum, &self.old_action, std::ptr::null_mut());
        }
    }
}

#[cfg(unix)]
struct TerminalForeground {
    stdin_fd: libc::c_int,
    parent_pgrp: libc::pid_t,
    handed_off: bool,
}

#[cfg(unix)]
impl TerminalForeground {
    fn hand_to(stdin_fd: libc::c_int, parent_pgrp: libc::pid_t, child_pgrp: libc::pid_t) -> Self {
        let handed_off = unsafe { libc::tcsetpgrp(stdin_fd, child_pgrp) == 0 };
        Self {
            stdin_fd,
            parent_pgrp,
            handed_off,
        }
    }
}

#[cfg(unix)]
impl Drop for TerminalForeground {
    fn drop(&mut self) {
        if self.handed_off {
            unsafe {
                let _ = libc::tcsetpgrp(self.stdin_fd, self.parent_pgrp);
            }
        }
    }
}

/// A spawned player that owns the terminal until it exits or this handle is dropped.
///
/// While alive, the parent ignores SIGINT so Ctrl-C reaches the player only. Dropping a
/// still-running child kills it before the terminal and signal state are restored.
pub(crate) struct InteractiveChild {
    child: Child,
    #[cfg(unix)]
    _terminal: Option<TerminalForeground>,
    #[cfg(unix)]
    _sigttou: Option<ScopedSigaction>,
    #[cfg(unix)]
    _sigint: ScopedSigaction,
}

impl InteractiveChild {
    #[cfg(unix)]
    pub(crate) fn spawn(mut cmd: ProcessCommand) -> Result<Self> {
        let sigint = ScopedSigaction::ignore(libc::SIGINT)?;
        let stdin_fd = libc::STDIN_FILENO;
        let parent_pgrp = unsafe { libc::tcgetpgrp(stdin_fd) };
        let owns_terminal = parent_pgrp != -1;

        let sigttou = if owns_terminal {
            Some(ScopedSigaction::ignore(libc::SIGTTOU)?)
        } else {
            None
        };

        unsafe {
            cmd.pre_exec(move || {
                libc::signal(libc::SIGINT, libc::SIG_DFL);
                libc::signal(libc::SIGQUIT, libc::SIG_DFL);
                libc::signal(libc::SIGTSTP, libc::SIG_DFL);
                if owns_terminal && libc::setpgid(0, 0) != 0 {
                    return Err(std::io::Error::last_os_error());
                }
                Ok(())
            });
        }

        let child = cmd.spawn().context("failed to spawn player")?;
        let terminal = owns_terminal.then(|| {
            TerminalForeground::hand_to(stdin_fd, parent_pgrp, child.id() as libc::pid_t)
        });

        Ok(Self {
            child,
            _terminal: terminal,
            _sigttou: sigttou,
            _sigint: sigint,
        })
    }

    #[cfg(not(unix))]
    pub(crate) fn spawn(mut cmd: ProcessCommand) -> Result<Self> {
        let child = cmd.spawn().context("failed to spawn player")?;
        Ok(Self { child })
    }

    pub(crate) fn try_wait(&mut self) -> Result<Option<ExitStatus>> {
        self.child
            .try_wait()
            .context("failed to poll player process")
    }
}

impl Drop for InteractiveChild {
    fn drop(&mut self) {
        if let Ok(None) = self.child.try_wait() {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}
