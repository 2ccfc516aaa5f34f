//! Threaded runner tests: command delivery, publication cadence, pause and
//! shutdown.

use approx::assert_relative_eq;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use quadsim_core::airframe::Airframe;
use quadsim_core::control::{Axis, PidGainsUpdate};
use quadsim_core::simulation::{SetpointUpdate, SimConfig};
use quadsim_runtime::{
    ConsoleApi, ConsoleError, Frame, RunnerConfig, RuntimeError, SimulationHandle,
    SimulationRunner,
};

const TIMEOUT: Duration = Duration::from_secs(5);

fn spawn(runner: RunnerConfig, config: SimConfig) -> SimulationHandle {
    SimulationRunner::new(runner)
        .spawn(Arc::new(Airframe::default()), config)
        .expect("spawn simulation thread")
}

fn unpaced(publish_every: usize) -> RunnerConfig {
    RunnerConfig::default()
        .with_real_time_factor(0.0)
        .with_publish_every(publish_every)
}

fn seeded() -> SimConfig {
    SimConfig {
        seed: Some(11),
        ..SimConfig::ideal()
    }
}

/// Poll the latest frame until `pred` holds
fn wait_for(handle: &SimulationHandle, pred: impl Fn(&Frame) -> bool) -> Arc<Frame> {
    let start = Instant::now();
    loop {
        if let Some(frame) = handle.latest() {
            if pred(&frame) {
                return frame;
            }
        }
        assert!(start.elapsed() < TIMEOUT, "condition not reached in time");
        thread::sleep(Duration::from_millis(2));
    }
}

mod publication_tests {
    use super::*;

    #[test]
    fn test_initial_frame_before_first_step() {
        let handle = spawn(unpaced(10), seeded());
        let first = handle.frames().recv_timeout(TIMEOUT).unwrap();

        assert_eq!(first.step_count, 0);
        assert!(first.last_step.is_none());
        assert!(first.snapshot.state.on_ground);
        handle.shutdown().unwrap();
    }

    #[test]
    fn test_publish_cadence() {
        let handle = spawn(unpaced(5), seeded());

        for _ in 0..10 {
            let frame = handle.frames().recv_timeout(TIMEOUT).unwrap();
            assert_eq!(frame.step_count % 5, 0);
        }
        assert!(handle.version() >= 10);
        handle.shutdown().unwrap();
    }

    #[test]
    fn test_session_reset_latched_between_frames() {
        // rollover on step 11, 22, ... ; frames only every 100 steps
        let config = SimConfig {
            session_duration: 0.05,
            ..seeded()
        };
        let handle = spawn(unpaced(100), config);

        let first = handle.frames().recv_timeout(TIMEOUT).unwrap();
        let second = handle.frames().recv_timeout(TIMEOUT).unwrap();

        assert!(!first.snapshot.session_reset);
        assert_eq!(second.step_count, 100);
        assert!(second.snapshot.session_reset);
        assert!(second.snapshot.timeline.session_id >= 9);
        // the last step itself did not roll over
        assert!(!second.last_step.unwrap().session_reset);
        handle.shutdown().unwrap();
    }

    #[test]
    fn test_no_reset_flag_within_session() {
        let handle = spawn(unpaced(100), seeded());

        let _initial = handle.frames().recv_timeout(TIMEOUT).unwrap();
        let frame = handle.frames().recv_timeout(TIMEOUT).unwrap();

        assert_eq!(frame.step_count, 100);
        assert!(!frame.snapshot.session_reset);
        assert_eq!(frame.snapshot.timeline.session_id, 0);
        handle.shutdown().unwrap();
    }

    #[test]
    fn test_slow_consumer_drops_frames() {
        let runner = unpaced(1).with_feed_capacity(2);
        let handle = spawn(runner, seeded());

        wait_for(&handle, |f| f.step_count > 50);

        assert!(handle.dropped_frames() > 0);
        assert_eq!(handle.frames().len(), 2);
        handle.shutdown().unwrap();
    }
}

mod command_tests {
    use super::*;

    #[test]
    fn test_setpoint_reaches_simulator() {
        let handle = spawn(unpaced(10), seeded());

        handle
            .set_setpoint(SetpointUpdate {
                roll: Some(0.1),
                throttle: Some(0.3),
                ..Default::default()
            })
            .unwrap();
        let frame = wait_for(&handle, |f| f.snapshot.setpoint.throttle == 0.3);

        assert_eq!(frame.snapshot.setpoint.roll, 0.1);
        assert_eq!(frame.snapshot.setpoint.pitch, 0.0);
        handle.shutdown().unwrap();
    }

    #[test]
    fn test_pid_update_reaches_simulator() {
        let handle = spawn(unpaced(10), seeded());

        handle
            .update_pid(
                Axis::Pitch,
                PidGainsUpdate {
                    kd: Some(2.5),
                    ..Default::default()
                },
            )
            .unwrap();
        let frame = wait_for(&handle, |f| f.snapshot.pid.pitch.kd == 2.5);

        assert_eq!(frame.snapshot.pid.roll.kd, 1.5);
        handle.shutdown().unwrap();
    }

    #[test]
    fn test_request_snapshot_while_paused() {
        let handle = spawn(unpaced(1000), seeded());
        handle.pause().unwrap();
        let before = handle.version();

        handle.request_snapshot().unwrap();
        let start = Instant::now();
        while handle.version() == before {
            assert!(start.elapsed() < TIMEOUT);
            thread::sleep(Duration::from_millis(2));
        }
        handle.shutdown().unwrap();
    }

    #[test]
    fn test_writes_never_wait_for_a_slow_loop() {
        // one command slot, one second of wall clock per step
        let runner = RunnerConfig::default()
            .with_command_capacity(1)
            .with_real_time_factor(0.005)
            .with_publish_every(1);
        let handle = spawn(runner, seeded());
        let console = ConsoleApi::new(&handle);
        // first step done, the loop now sleeps until the next tick
        wait_for(&handle, |f| f.step_count >= 1);

        let start = Instant::now();
        let results = [
            handle.set_setpoint(SetpointUpdate::throttle(0.2)),
            handle.set_setpoint(SetpointUpdate::throttle(0.3)),
            handle.set_setpoint(SetpointUpdate::throttle(0.4)),
            handle.update_pid(Axis::Roll, PidGainsUpdate::default()),
            handle.set_rotor_power(0, Some(10)),
        ];
        let console_result = console.set_rotor_power(1, 20.0);
        let elapsed = start.elapsed();

        assert!(elapsed < Duration::from_millis(500), "writes took {elapsed:?}");
        let full = results
            .iter()
            .filter(|r| matches!(r, Err(RuntimeError::QueueFull(_))))
            .count();
        assert!(results[0].is_ok());
        assert_eq!(full, 4, "{results:?}");
        assert!(matches!(
            console_result,
            Err(ConsoleError::Runtime(RuntimeError::QueueFull("set_rotor_power")))
        ));
        handle.shutdown().unwrap();
    }

    #[test]
    fn test_reset_grounds_vehicle() {
        let handle = spawn(unpaced(10), seeded());
        handle.set_setpoint(SetpointUpdate::throttle(0.5)).unwrap();
        wait_for(&handle, |f| f.snapshot.state.position.z > 0.5);

        handle.pause().unwrap();
        handle.reset().unwrap();
        let frame = wait_for(&handle, |f| f.snapshot.state.position.z == 0.0);

        assert!(frame.snapshot.state.on_ground);
        // reset keeps the pilot input
        assert_eq!(frame.snapshot.setpoint.throttle, 0.5);
        handle.shutdown().unwrap();
    }
}

mod pause_tests {
    use super::*;

    #[test]
    fn test_pause_stops_stepping_and_resume_restarts() {
        let handle = spawn(unpaced(1), seeded());
        wait_for(&handle, |f| f.step_count > 10);

        handle.pause().unwrap();
        // pausing twice is harmless
        handle.pause().unwrap();
        thread::sleep(Duration::from_millis(100));
        let paused_at = handle.latest().unwrap().step_count;
        thread::sleep(Duration::from_millis(100));
        assert_eq!(handle.latest().unwrap().step_count, paused_at);
        assert!(handle.is_running());

        handle.resume().unwrap();
        handle.resume().unwrap();
        wait_for(&handle, |f| f.step_count > paused_at);
        handle.shutdown().unwrap();
    }

    #[test]
    fn test_paced_run_follows_wall_clock() {
        // 5 ms per step at real time
        let runner = RunnerConfig::default().with_publish_every(1);
        let handle = spawn(runner, seeded());

        thread::sleep(Duration::from_millis(200));
        let steps = handle.latest().unwrap().step_count;

        assert!(steps > 0);
        assert!(steps < 200, "ran {steps} steps in 200 ms");
        handle.shutdown().unwrap();
    }
}

mod shutdown_tests {
    use super::*;

    #[test]
    fn test_shutdown_joins_thread() {
        let handle = spawn(unpaced(10), seeded());
        assert!(handle.is_running());

        assert!(handle.shutdown().is_ok());
    }

    #[test]
    fn test_shutdown_while_paused() {
        let handle = spawn(unpaced(10), seeded());
        handle.pause().unwrap();

        assert!(handle.shutdown().is_ok());
    }

    #[test]
    fn test_drop_stops_thread() {
        let handle = spawn(unpaced(10), seeded());
        let frames = handle.frames().clone();
        drop(handle);

        // the sender side is gone once the thread exits
        let start = Instant::now();
        loop {
            match frames.try_recv() {
                Err(crossbeam_channel::TryRecvError::Disconnected) => break,
                _ => assert!(start.elapsed() < TIMEOUT),
            }
        }
    }
}

mod console_tests {
    use super::*;

    #[test]
    fn test_reads_sensor_surface() {
        let handle = spawn(unpaced(10), seeded());
        wait_for(&handle, |f| f.step_count >= 10);
        let console = ConsoleApi::new(&handle);

        assert_eq!(console.abs_altitude(), Some(0.0));
        assert!(console.altitude().is_some());
        assert!(console.tof().is_some());
        assert!(console.estimated_attitude().is_some());
        assert!(console.attitude().is_some());
        let imu = console.imu().unwrap();
        assert!(imu.accel.z > 9.0);
        assert!(console.magnetometer().unwrap().norm() > 0.4);
        assert!(console.timeline().unwrap().absolute > 0.0);
        handle.shutdown().unwrap();
    }

    #[test]
    fn test_rotor_power_and_disable() {
        let handle = spawn(unpaced(10), seeded());
        let console = ConsoleApi::new(&handle);

        console.set_rotor_power(2, 300.0).unwrap();
        let frame = wait_for(&handle, |f| f.snapshot.rotors[2].override_rpm.is_some());
        assert_relative_eq!(
            frame.snapshot.rotors[2].override_rpm.unwrap(),
            frame.snapshot.airframe.max_rpm,
            epsilon = 1e-9
        );

        console.set_rotor_power(0, 0.0).unwrap();
        wait_for(&handle, |f| f.snapshot.rotors[0].override_rpm == Some(0.0));

        console.clear_rotor(0).unwrap();
        wait_for(&handle, |f| f.snapshot.rotors[0].override_rpm.is_none());

        console.disable("script raised an error").unwrap();
        wait_for(&handle, |f| f.snapshot.rotors.iter().all(|r| r.override_rpm.is_none()));
        handle.shutdown().unwrap();
    }

    #[test]
    fn test_rejects_bad_rotor_input() {
        let handle = spawn(unpaced(10), seeded());
        let console = ConsoleApi::new(&handle);

        assert!(matches!(
            console.set_rotor_power(4, 100.0),
            Err(ConsoleError::UnknownRotor(4))
        ));
        assert!(matches!(
            console.set_rotor_power(1, f64::NAN),
            Err(ConsoleError::InvalidPower(_))
        ));
        assert!(matches!(console.clear_rotor(9), Err(ConsoleError::UnknownRotor(9))));
        handle.shutdown().unwrap();
    }
}
