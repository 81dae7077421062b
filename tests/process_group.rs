use std::{net::TcpListener, thread, time::Duration};

use trainer::{
    CoordinatorErr,
    coordinator::{ProcessGroup, Rendezvous, Synchronizer},
};

fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

fn rendezvous(world_size: usize, timeout: Duration) -> Rendezvous {
    Rendezvous {
        addr: "127.0.0.1".to_string(),
        port: free_port(),
        world_size,
        timeout,
    }
}

#[test]
fn collectives_agree_across_workers() {
    const WORLD_SIZE: usize = 3;
    let rdv = rendezvous(WORLD_SIZE, Duration::from_secs(10));

    let handles: Vec<_> = (0..WORLD_SIZE)
        .map(|rank| {
            let rdv = rdv.clone();
            thread::spawn(move || {
                let mut group = ProcessGroup::setup(&rdv, rank).unwrap();
                assert_eq!(group.context().rank(), rank);
                assert_eq!(group.context().is_master(), rank == 0);

                let mut grad = vec![rank as f32, 10. * rank as f32, 1.];
                group.reduce(&mut grad).unwrap();

                let mut params = if rank == 0 {
                    vec![7., 8.]
                } else {
                    vec![0., 0.]
                };
                group.broadcast(&mut params).unwrap();

                group.teardown().unwrap();
                (grad, params)
            })
        })
        .collect();

    for handle in handles {
        let (grad, params) = handle.join().unwrap();

        for (got, expected) in grad.iter().zip([1., 10., 1.]) {
            assert!((got - expected).abs() < 1e-5, "{got} != {expected}");
        }
        assert_eq!(params, vec![7., 8.]);
    }
}

#[test]
fn repeated_reductions_stay_in_lock_step() {
    let rdv = rendezvous(2, Duration::from_secs(10));

    let handles: Vec<_> = (0..2)
        .map(|rank| {
            let rdv = rdv.clone();
            thread::spawn(move || {
                let mut group = ProcessGroup::setup(&rdv, rank).unwrap();
                let mut sums = Vec::new();

                for step in 0..20 {
                    let mut grad = vec![(rank * step) as f32; 64];
                    group.all_reduce_mean(&mut grad).unwrap();
                    sums.push(grad[63]);
                }

                group.teardown().unwrap();
                sums
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(results[0], results[1]);
    assert_eq!(results[0][4], 2.);
}

#[test]
fn out_of_range_rank_is_rejected() {
    let rdv = rendezvous(2, Duration::from_secs(1));
    assert!(matches!(
        ProcessGroup::setup(&rdv, 2),
        Err(CoordinatorErr::InvalidRank { rank: 2, world_size: 2 })
    ));
}

#[test]
fn missing_workers_time_out() {
    let rdv = rendezvous(2, Duration::from_millis(300));
    assert!(matches!(
        ProcessGroup::setup(&rdv, 0),
        Err(CoordinatorErr::Timeout { .. })
    ));
}

#[test]
fn missing_root_times_out() {
    let rdv = rendezvous(2, Duration::from_millis(300));
    assert!(matches!(
        ProcessGroup::setup(&rdv, 1),
        Err(CoordinatorErr::Timeout { .. })
    ));
}

#[test]
fn world_size_disagreement_is_fatal() {
    let rdv = rendezvous(2, Duration::from_secs(5));
    let mut other = rdv.clone();
    other.world_size = 3;

    let leaf = thread::spawn(move || ProcessGroup::setup(&other, 1).is_err());

    assert!(matches!(
        ProcessGroup::setup(&rdv, 0),
        Err(CoordinatorErr::WorldSizeMismatch { got: 3, expected: 2 })
    ));
    assert!(leaf.join().unwrap());
}
