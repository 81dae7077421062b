use std::{
    env,
    ffi::OsString,
    process::{Child, Command},
};

use log::{error, info};

use crate::error::{Result, TrainErr};

/// Spawns `world_size` workers of the running executable and waits for all of them.
///
/// Each worker is started with the arguments of this process plus its `--rank` and
/// `--world-size`.
///
/// # Returns
/// An error naming the ranks that failed, if any did.
pub fn launch(world_size: usize) -> Result<()> {
    let exe = env::current_exe().map_err(|source| TrainErr::Io {
        path: "current executable".into(),
        source,
    })?;
    let args: Vec<OsString> = env::args_os().skip(1).collect();

    info!("spawning {world_size} workers");

    let mut children: Vec<(usize, Child)> = Vec::with_capacity(world_size);
    for rank in 0..world_size {
        let spawned = Command::new(&exe)
            .args(&args)
            .args(worker_args(rank, world_size))
            .spawn();

        match spawned {
            Ok(child) => children.push((rank, child)),
            Err(source) => {
                for (_, child) in children.iter_mut() {
                    let _ = child.kill();
                }
                return Err(TrainErr::Io {
                    path: exe.clone(),
                    source,
                });
            }
        }
    }

    let mut failed = Vec::new();
    for (rank, mut child) in children {
        match child.wait() {
            Ok(status) if status.success() => info!(rank = rank; "worker finished"),
            Ok(status) => {
                error!(rank = rank; "worker exited with {status}");
                failed.push(rank);
            }
            Err(e) => {
                error!(rank = rank; "failed to wait for worker: {e}");
                failed.push(rank);
            }
        }
    }

    if !failed.is_empty() {
        return Err(TrainErr::WorkersFailed(failed));
    }

    Ok(())
}

/// The extra arguments that turn a copy of this process into the worker `rank`.
pub fn worker_args(rank: usize, world_size: usize) -> [String; 4] {
    [
        "--rank".to_string(),
        rank.to_string(),
        "--world-size".to_string(),
        world_size.to_string(),
    ]
}
