//! Integration tests for the blink crates.
//!
//! End-to-end scenarios across the cache, budget, contrast engine and
//! background tasks, using real cache files in temporary directories.


#[cfg(test)]
mod stack_tests {
    use std::thread;
    use std::time::Duration;

    use approx::assert_abs_diff_eq;
    use blink_core::{Error, OriginalState};
    use blink_cube::{
        AxisPermutation, ContrastEngine, MultiFrameStack, PermuteOutcome, PlaybackMode, StackEvent, TaskRequest,
        TaskState,
    };
    use tempfile::tempdir;

    use crate::fixtures::*;

    #[test]
    fn recut_of_three_frame_cube() {
        let registry = registry(1 << 20);
        let planes = vec![
            plane(2, 2, &[1000.0; 4], "a"),
            plane(2, 2, &[3000.0; 4], "b"),
            plane(2, 2, &[5000.0; 4], "c"),
        ];
        let stack = registry.stack_from_images(planes, Some("m42".into())).unwrap();
        let summary = stack.recut_stack(1000.0, 5000.0, false).unwrap();
        assert_eq!(summary.recut, 3);

        assert_eq!(stack.display_pixels(0).unwrap(), vec![0; 4]);
        assert_eq!(stack.display_pixels(1).unwrap(), vec![127; 4]);
        assert_eq!(stack.display_pixels(2).unwrap(), vec![255; 4]);
        assert_eq!(stack.frame_label(1).unwrap(), "b");
    }

    #[test]
    fn display_rows_are_inverted_from_coded_rows() {
        let registry = registry(1 << 20);
        // bottom row 0, top row 100
        let stack = registry
            .stack_from_images(vec![plane(2, 2, &[0.0, 0.0, 100.0, 100.0], "p")], None)
            .unwrap();
        stack.recut_frame(0, 0.0, 100.0, false).unwrap();
        assert_eq!(stack.display_pixels(0).unwrap(), vec![255, 255, 0, 0]);
        // top-left voxel origin matches the display
        assert_eq!(stack.pixel_value(0, 0, 0).unwrap(), 100.0);
        assert_eq!(stack.pixel_value(0, 1, 0).unwrap(), 0.0);
    }

    #[test]
    fn display_inverts_within_one_step() {
        let dir = tempdir().unwrap();
        let source = cube_file(dir.path(), "ramp.raw", (16, 16, 1), |x, y, _| (y * 16 + x) as f64 * 3.0);
        let registry = registry(1 << 20);
        let stack = registry.open_cube(source).unwrap();
        stack.recut_stack(0.0, 765.0, false).unwrap();
        let state = stack.contrast();
        let step = (state.cut_max - state.cut_min) / 255.0;
        let display = stack.display_pixels(0).unwrap();
        for y in 0..16 {
            for x in 0..16 {
                let value = stack.pixel_value(x, y, 0).unwrap();
                let back = ContrastEngine::unmap_value(display[y * 16 + x], &state);
                assert!((back - value).abs() <= step + 1e-9, "({x},{y}) {value} -> {back}");
            }
        }
    }

    #[test]
    fn activation_twice_changes_nothing() {
        let dir = tempdir().unwrap();
        let source = cube_file(dir.path(), "c.raw", (4, 4, 3), |x, y, z| (z * 100 + y * 4 + x) as f64);
        let registry = registry(1 << 20);
        let stack = registry.open_cube(source).unwrap();
        stack.set_playback_mode(PlaybackMode::Paused);

        stack.activate_frame(2).unwrap();
        let stats = stack.stats();
        let resident = registry.budget().resident();
        let display = stack.active_display();
        stack.activate_frame(2).unwrap();
        assert_eq!(stack.stats(), stats);
        assert_eq!(registry.budget().resident(), resident);
        assert_eq!(stack.active_display(), display);
    }

    #[test]
    fn evicted_frame_reloads_identically() {
        let dir = tempdir().unwrap();
        let source = cube_file(dir.path(), "c.raw", (4, 4, 2), |x, y, z| (z * 1000 + y * 10 + x) as f64 - 500.0);
        let registry = registry(1 << 20);
        let stack = registry.open_cube(source).unwrap();

        assert!(stack.ensure_loaded(1).unwrap());
        let before = stack.extract_subvolume(0, 0, 1, 4, 4, 1).unwrap();
        assert!(stack.evict(1).unwrap() > 0);
        assert_eq!(stack.original_state(1).unwrap(), OriginalState::Cached);
        assert!(stack.ensure_loaded(1).unwrap());
        assert_eq!(stack.extract_subvolume(0, 0, 1, 4, 4, 1).unwrap(), before);
        assert_eq!(stack.stats().loads, 2);
    }

    #[test]
    fn extract_subvolume_of_middle_frame() {
        let dir = tempdir().unwrap();
        let source = cube_file(dir.path(), "c.raw", (4, 4, 3), |x, y, z| (z * 100 + y * 4 + x) as f64);
        let registry = registry(1 << 20);
        let stack = registry.open_cube(source).unwrap();

        let cube = stack.extract_subvolume(0, 0, 1, 2, 2, 1).unwrap();
        assert_eq!((cube.width, cube.height, cube.depth), (2, 2, 1));
        // top two rows of frame 1 are FITS rows 3 and 2
        assert_eq!(cube.values, vec![112.0, 113.0, 108.0, 109.0]);
        assert_eq!(cube.get(1, 1, 0), Some(109.0));

        let err = stack.extract_subvolume(3, 0, 0, 2, 1, 1).unwrap_err();
        assert!(matches!(err, Error::VoxelOutOfRange { .. }));
        assert!(stack.extract_subvolume(0, 0, 0, 0, 1, 1).is_err());
    }

    #[test]
    fn extraction_streams_when_budget_is_short() {
        let dir = tempdir().unwrap();
        let source = cube_file(dir.path(), "c.raw", (4, 4, 3), |x, y, z| (z * 100 + y * 4 + x) as f64);
        let registry = registry(32);
        let stack = registry.open_cube(source).unwrap();

        let cube = stack.extract_subvolume(1, 2, 0, 2, 1, 3).unwrap();
        assert_eq!(cube.values, vec![5.0, 6.0, 105.0, 106.0, 205.0, 206.0]);
        assert!(registry.budget().resident() <= 32);
    }

    #[test]
    fn permutation_round_trip_restores_cube() {
        let dir = tempdir().unwrap();
        let source = cube_file(dir.path(), "c.raw", (5, 3, 4), |x, y, z| (z * 100 + y * 10 + x) as f64);
        let registry = registry(1 << 20);
        let stack = registry.open_cube(source).unwrap();
        let values = stack.extract_subvolume(0, 0, 0, 5, 3, 4).unwrap();
        let displays: Vec<Vec<u8>> = (0..4).map(|i| stack.display_pixels(i).unwrap()).collect();
        let labels: Vec<String> = (0..4).map(|i| stack.frame_label(i).unwrap()).collect();

        for target in [AxisPermutation::SwapWidthDepth, AxisPermutation::SwapHeightDepth] {
            assert_eq!(stack.permute_axes(target).unwrap(), PermuteOutcome::Permuted);
            let (w, h, d) = stack.dims();
            assert_eq!((w, h, d), target.map((5, 3, 4)));
            // one voxel through the transposition, top-left origin
            if target == AxisPermutation::SwapWidthDepth {
                assert_eq!(stack.pixel_value(2, 1, 4).unwrap(), values.get(4, 1, 2).unwrap());
            }

            assert_eq!(stack.permute_axes(AxisPermutation::Natural).unwrap(), PermuteOutcome::Permuted);
            assert_eq!(stack.dims(), (5, 3, 4));
            assert_eq!(stack.extract_subvolume(0, 0, 0, 5, 3, 4).unwrap(), values);
            for i in 0..4 {
                assert_eq!(stack.display_pixels(i).unwrap(), displays[i]);
                assert_eq!(stack.frame_label(i).unwrap(), labels[i]);
            }
        }
        assert_eq!(
            stack.permute_axes(AxisPermutation::Natural).unwrap(),
            PermuteOutcome::Unchanged
        );
    }

    #[test]
    fn permutation_without_memory_keeps_display_only() {
        let dir = tempdir().unwrap();
        let source = cube_file(dir.path(), "c.raw", (4, 4, 4), |x, y, z| (z * 16 + y * 4 + x) as f64);
        let registry = registry(64);
        let stack = registry.open_cube(source).unwrap();
        let events = stack.subscribe();
        let natural = stack.display_pixels(0).unwrap();

        assert_eq!(
            stack.permute_axes(AxisPermutation::SwapWidthDepth).unwrap(),
            PermuteOutcome::Degraded
        );
        assert!(stack.is_degraded());
        assert!(matches!(events.try_recv(), Ok(StackEvent::Warning(_))));
        assert_eq!(stack.original_state(0).unwrap(), OriginalState::Unavailable);
        assert!(stack.pixel_value(0, 0, 0).unwrap_err().is_unavailable());
        // column 0 of natural frame 0 became row data of frame 0
        let permuted = stack.display_pixels(0).unwrap();
        assert_eq!(permuted[0], natural[0]);
        assert_eq!(registry.budget().resident(), 0);
    }

    #[test]
    fn permutation_drops_and_restores_calibration() {
        let dir = tempdir().unwrap();
        let mut source = cube_file(dir.path(), "c.raw", (3, 3, 2), |x, y, _| (y * 3 + x) as f64);
        source.header = celestial_header();
        let registry = registry(1 << 20);
        let stack = registry.open_cube(source).unwrap();
        let wcs = stack.wcs().unwrap();
        let events = stack.subscribe();

        stack.permute_axes(AxisPermutation::SwapHeightDepth).unwrap();
        assert!(stack.wcs().is_none());
        assert!(!stack.header().contains("CRPIX1"));
        assert!(
            events
                .try_iter()
                .any(|e| matches!(e, StackEvent::Warning(m) if m.contains("calibration")))
        );

        stack.permute_axes(AxisPermutation::Natural).unwrap();
        assert_eq!(stack.wcs(), Some(wcs));
        assert_eq!(stack.header().get_str("CTYPE2"), Some("DEC--TAN"));
    }

    #[test]
    fn same_projection_append_is_a_copy() {
        let registry = registry(1 << 20);
        let wcs = blink_core::Wcs::from_header(&celestial_header()).unwrap();
        let first = plane(3, 3, &[1.0; 9], "first").with_wcs(wcs.clone());
        let stack = registry.stack_from_images(vec![first], None).unwrap();

        let values: Vec<f64> = (0..9).map(f64::from).collect();
        let mut second = plane(3, 3, &values, "second").with_wcs(wcs);
        second.display = (10..19).collect();
        assert_eq!(stack.append_frames(vec![second]).unwrap(), 1);

        assert_eq!(stack.depth(), 2);
        assert_eq!(stack.display_pixels(1).unwrap(), (10..19).collect::<Vec<u8>>());
        assert_eq!(stack.pixel_value(0, 2, 1).unwrap(), 0.0);
        assert_eq!(stack.pixel_value(2, 0, 1).unwrap(), 8.0);
    }

    #[test]
    fn mismatched_uncalibrated_append_fails() {
        let registry = registry(1 << 20);
        let stack = registry.stack_from_images(vec![plane(2, 2, &[0.0; 4], "a")], None).unwrap();
        let err = stack.append_frames(vec![plane(3, 1, &[0.0; 3], "b")]).unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { .. }));
        assert_eq!(stack.depth(), 1);
    }

    #[test]
    fn eviction_crosses_stacks() {
        let dir = tempdir().unwrap();
        let slice = 4 * 4 * 2;
        let registry = registry(2 * slice);
        let a = registry
            .open_cube(cube_file(dir.path(), "a.raw", (4, 4, 3), |x, _, z| (z + x) as f64))
            .unwrap();
        let b = registry
            .open_cube(cube_file(dir.path(), "b.raw", (4, 4, 3), |x, _, z| (z * x) as f64))
            .unwrap();

        a.activate_frame(0).unwrap();
        assert!(a.ensure_loaded(1).unwrap());
        assert_eq!(registry.budget().resident(), 2 * slice);

        assert!(b.ensure_loaded(0).unwrap());
        assert_eq!(a.original_state(0).unwrap(), OriginalState::Resident);
        assert_eq!(a.original_state(1).unwrap(), OriginalState::Cached);
        assert_eq!(b.original_state(0).unwrap(), OriginalState::Resident);
        assert_eq!(registry.budget().resident(), 2 * slice);
        assert!(registry.report().cooperative_freed >= slice);
    }

    #[test]
    fn scratch_spill_makes_planes_evictable() {
        let dir = tempdir().unwrap();
        let registry = blink_cube::BlinkRegistry::new(
            blink_cube::RegistryConfig::with_budget(blink_cache::BudgetConfig::with_limit(1 << 20))
                .scratch_dir(dir.path()),
        )
        .unwrap();
        let planes = (0..3)
            .map(|z| plane(2, 2, &[z as f64, 1.0, 2.0, 3.0], &format!("p{z}")))
            .collect();
        let stack = registry.stack_from_images(planes, None).unwrap();
        assert_eq!(stack.stats().spills, 3);

        assert_eq!(stack.evict(2).unwrap(), 8);
        assert_eq!(stack.original_state(2).unwrap(), OriginalState::Cached);
        assert_eq!(stack.pixel_value(0, 1, 2).unwrap(), 2.0);
        assert!(stack.ensure_loaded(2).unwrap());
        assert_eq!(stack.pixel_value(0, 1, 2).unwrap(), 2.0);
    }

    #[test]
    fn blinking_leaves_originals_alone() {
        let dir = tempdir().unwrap();
        let source = cube_file(dir.path(), "c.raw", (4, 4, 3), |x, _, _| x as f64);
        let registry = registry(1 << 20);
        let stack = registry.open_cube(source).unwrap();
        stack.set_playback_mode(PlaybackMode::Blinking {
            delay: Duration::from_millis(10),
        });
        for _ in 0..6 {
            let i = stack.next_frame();
            stack.activate_frame(i).unwrap();
        }
        assert_eq!(stack.stats().resident_frames, 0);
        stack.set_playback_mode(PlaybackMode::Paused);
        stack.activate_frame(1).unwrap();
        assert_eq!(stack.stats().resident_frames, 1);
        assert_abs_diff_eq!(stack.pixel_value(3, 0, 1).unwrap(), 3.0);
    }

    #[test]
    fn bulk_recut_reports_unreadable_frames_once() {
        let dir = tempdir().unwrap();
        let source = cube_file(dir.path(), "c.raw", (4, 4, 3), |x, _, z| (z * 10 + x) as f64);
        let path = source.path.clone();
        let registry = registry(1 << 20);
        let stack = registry.open_cube(source).unwrap();
        let events = stack.subscribe();
        let before = stack.display_pixels(2).unwrap();

        std::fs::remove_file(&path).unwrap();
        registry.files().close_all();
        let summary = stack.recut_stack(0.0, 1.0, false).unwrap();
        assert_eq!(summary.failed, 3);
        assert_eq!(stack.display_pixels(2).unwrap(), before);
        let warnings = events.try_iter().filter(|e| matches!(e, StackEvent::Warning(_))).count();
        assert_eq!(warnings, 1);

        // nothing left to read: later recuts skip silently
        let summary = stack.recut_stack(0.0, 1.0, false).unwrap();
        assert_eq!((summary.skipped, summary.failed), (3, 0));
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn permutation_with_unreadable_cache_keeps_display_only() {
        let dir = tempdir().unwrap();
        let source = cube_file(dir.path(), "c.raw", (4, 3, 5), |x, y, z| (z * 100 + y * 4 + x) as f64);
        let path = source.path.clone();
        let registry = registry(1 << 20);
        let stack = registry.open_cube(source).unwrap();
        let events = stack.subscribe();
        let natural = stack.display_pixels(0).unwrap();

        std::fs::remove_file(&path).unwrap();
        registry.files().close_all();
        assert_eq!(
            stack.permute_axes(AxisPermutation::SwapWidthDepth).unwrap(),
            PermuteOutcome::Degraded
        );
        assert_eq!(stack.dims(), (5, 3, 4));
        assert!(stack.is_degraded());
        let warnings: Vec<String> = events
            .try_iter()
            .filter_map(|e| match e {
                StackEvent::Warning(m) => Some(m),
                _ => None,
            })
            .collect();
        assert_eq!(warnings.len(), 1, "{warnings:?}");
        assert!(warnings[0].contains("could not be read"), "{}", warnings[0]);
        for i in 0..4 {
            assert_eq!(stack.original_state(i).unwrap(), OriginalState::Unavailable);
        }
        assert_eq!(stack.display_pixels(0).unwrap()[0], natural[0]);
        assert_eq!(registry.budget().resident(), 0);
    }

    #[test]
    fn stacks_share_budget_across_threads() {
        let dir = tempdir().unwrap();
        let (w, h, d) = (16, 16, 6);
        let slice = (w * h * 2) as u64;
        let limit = 2 * slice;
        let registry = registry(limit);
        let a = registry
            .open_cube(cube_file(dir.path(), "a.raw", (w, h, d), |x, y, z| (z * 1000 + y * 16 + x) as f64))
            .unwrap();
        let b = registry
            .open_cube(cube_file(dir.path(), "b.raw", (w, h, d), |x, y, z| (z * 1000 + x * 16 + y) as f64))
            .unwrap();
        let budget = registry.budget();

        thread::scope(|s| {
            let worker = |stack: &MultiFrameStack, value: fn(usize, usize, usize) -> f64| {
                for round in 0..30 {
                    stack
                        .submit(TaskRequest::RecutStack {
                            min: 0.0,
                            max: 6000.0,
                            autocut: false,
                        })
                        .unwrap();
                    let z = round % d;
                    stack.ensure_loaded(z).unwrap();
                    assert!(budget.resident() <= limit);

                    // top-left voxel is FITS row h - 1
                    let cube = stack.extract_subvolume(0, 0, 0, 2, 1, d).unwrap();
                    for k in 0..d {
                        assert_eq!(cube.get(0, 0, k), Some(value(0, h - 1, k)));
                        assert_eq!(cube.get(1, 0, k), Some(value(1, h - 1, k)));
                    }
                    assert!(budget.resident() <= limit);
                }
                stack.wait_task();
            };
            let (a, b) = (&a, &b);
            s.spawn(move || worker(a, |x, y, z| (z * 1000 + y * 16 + x) as f64));
            s.spawn(move || worker(b, |x, y, z| (z * 1000 + x * 16 + y) as f64));
        });

        assert!(budget.resident() <= limit);
        assert_eq!(a.task_state(), TaskState::Completed);
        assert_eq!(b.task_state(), TaskState::Completed);
        assert_eq!(a.contrast().cut_max, 6000.0);
        assert_eq!(b.contrast().cut_max, 6000.0);
    }
}

#[cfg(test)]
mod task_tests {
    use std::thread;
    use std::time::{Duration, Instant};

    use blink_core::{Error, ImagePlane};
    use blink_cube::{AxisPermutation, StackEvent, TaskKind, TaskRequest, TaskState};
    use tempfile::tempdir;

    use crate::fixtures::*;

    #[test]
    fn background_recut_repaints_once() {
        let dir = tempdir().unwrap();
        let source = cube_file(dir.path(), "c.raw", (8, 8, 5), |x, y, z| (x + y + z) as f64);
        let registry = registry(1 << 20);
        let stack = registry.open_cube(source).unwrap();
        let events = stack.subscribe();

        stack
            .submit(TaskRequest::RecutStack {
                min: 0.0,
                max: 18.0,
                autocut: false,
            })
            .unwrap();
        stack.wait_task();

        assert_eq!(stack.task_state(), TaskState::Completed);
        let received: Vec<StackEvent> = events.try_iter().collect();
        assert_eq!(
            received,
            vec![StackEvent::Repaint {
                kind: TaskKind::RecutStack
            }]
        );
        assert_eq!(stack.display_pixels(4).unwrap()[0], ((7 + 0 + 4) as f64 / 18.0 * 255.0) as u8);
    }

    #[test]
    fn latest_request_wins() {
        let dir = tempdir().unwrap();
        let source = cube_file(dir.path(), "c.raw", (256, 256, 120), |x, y, z| ((x ^ y) + z) as f64);
        let registry = registry(1 << 30);
        let stack = registry.open_cube(source).unwrap();
        let events = stack.subscribe();
        let recut = |max: f64| TaskRequest::RecutStack {
            min: 0.0,
            max,
            autocut: false,
        };

        let start = stack.task_frames_processed();
        stack.submit(recut(100.0)).unwrap();
        let deadline = Instant::now() + Duration::from_secs(10);
        while stack.task_frames_processed() == start && Instant::now() < deadline {
            thread::yield_now();
        }
        // the first pass is mid-cube; these restart it
        for max in 2..=5 {
            stack.submit(recut(max as f64 * 100.0)).unwrap();
        }
        stack.wait_task();

        let contrast = stack.contrast();
        assert_eq!((contrast.cut_min, contrast.cut_max), (0.0, 500.0));
        let received: Vec<StackEvent> = events.try_iter().collect();
        assert_eq!(
            received,
            vec![StackEvent::Repaint {
                kind: TaskKind::RecutStack
            }]
        );
        assert_eq!(stack.task_state(), TaskState::Completed);
        let expected = (((3 ^ 0) + 7) as f64 / 500.0 * 255.0) as u8;
        assert_eq!(stack.display_pixels(7).unwrap()[255 * 256 + 3], expected);
    }

    #[test]
    fn cancellation_stops_at_next_frame() {
        let dir = tempdir().unwrap();
        let source = cube_file(dir.path(), "big.raw", (256, 256, 120), |x, y, z| ((x ^ y) + z) as f64);
        let registry = registry(1 << 30);
        let stack = registry.open_cube(source).unwrap();
        let events = stack.subscribe();

        let start = stack.task_frames_processed();
        stack
            .submit(TaskRequest::RecutStack {
                min: 0.0,
                max: 0.0,
                autocut: true,
            })
            .unwrap();
        let deadline = Instant::now() + Duration::from_secs(10);
        while stack.task_frames_processed() == start && Instant::now() < deadline {
            thread::yield_now();
        }

        let at_request = stack.task_frames_processed();
        stack.cancel_task();
        let after = stack.task_frames_processed();

        assert!(after - at_request <= 1, "processed {} frames after cancel", after - at_request);
        assert!(after - start < 120);
        assert_eq!(stack.task_state(), TaskState::Cancelled);
        let received: Vec<StackEvent> = events.try_iter().collect();
        assert_eq!(
            received,
            vec![StackEvent::Cancelled {
                kind: TaskKind::RecutStack
            }]
        );
    }

    #[test]
    fn different_kind_replaces_running_task() {
        let dir = tempdir().unwrap();
        let source = cube_file(dir.path(), "c.raw", (64, 64, 40), |x, y, z| (x + y * z) as f64);
        let registry = registry(1 << 26);
        let stack = registry.open_cube(source).unwrap();
        let events = stack.subscribe();

        stack
            .submit(TaskRequest::RecutStack {
                min: 0.0,
                max: 1.0,
                autocut: true,
            })
            .unwrap();
        stack
            .submit(TaskRequest::PermuteAxes(AxisPermutation::SwapWidthDepth))
            .unwrap();
        stack.wait_task();

        assert_eq!(stack.dims(), (40, 64, 64));
        let received: Vec<StackEvent> = events.try_iter().collect();
        assert_eq!(
            received.last(),
            Some(&StackEvent::Repaint {
                kind: TaskKind::PermuteAxes
            })
        );
        // the recut either finished or was cancelled, once
        assert_eq!(received.len(), 2);
    }

    #[test]
    fn queued_appends_all_land() {
        let registry = registry(1 << 20);
        let stack = registry
            .stack_from_images(vec![plane(2, 2, &[0.0; 4], "base")], None)
            .unwrap();
        let events = stack.subscribe();

        for batch in 0..3 {
            let planes = (0..4)
                .map(|i| plane(2, 2, &[(batch * 4 + i) as f64; 4], &format!("b{batch}-{i}")))
                .collect();
            stack.submit(TaskRequest::AppendFrames(planes)).unwrap();
        }
        stack.wait_task();

        assert_eq!(stack.depth(), 13);
        assert!(
            events
                .try_iter()
                .all(|e| matches!(e, StackEvent::Repaint { kind: TaskKind::AppendFrames }))
        );
    }

    #[test]
    fn malformed_append_leaves_worker_usable() {
        let registry = registry(1 << 20);
        let stack = registry
            .stack_from_images(vec![plane(2, 2, &[0.0; 4], "base")], None)
            .unwrap();
        let events = stack.subscribe();

        let short = ImagePlane::from_display(2, 2, vec![1, 2, 3], "short");
        let err = stack.append_frames(vec![short]).unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { .. }));
        assert_eq!(stack.depth(), 1);

        let short = ImagePlane::from_display(2, 2, vec![1, 2, 3], "short");
        stack.submit(TaskRequest::AppendFrames(vec![short])).unwrap();
        stack.wait_task();
        assert!(matches!(
            events.try_recv(),
            Ok(StackEvent::Failed {
                kind: TaskKind::AppendFrames,
                ..
            })
        ));
        assert_eq!(stack.depth(), 1);

        stack
            .submit(TaskRequest::PermuteAxes(AxisPermutation::SwapWidthDepth))
            .unwrap();
        stack.wait_task();
        assert_eq!(stack.task_state(), TaskState::Completed);
        assert_eq!(stack.dims(), (1, 2, 2));
        assert_eq!(
            events.try_recv(),
            Ok(StackEvent::Repaint {
                kind: TaskKind::PermuteAxes
            })
        );
    }

    #[test]
    fn failed_task_is_reported() {
        let registry = registry(1 << 20);
        let stack = registry
            .stack_from_images(vec![plane(2, 2, &[0.0; 4], "base")], None)
            .unwrap();
        let events = stack.subscribe();

        stack
            .submit(TaskRequest::RecutFrame {
                index: 9,
                min: 0.0,
                max: 1.0,
                autocut: false,
            })
            .unwrap();
        stack.wait_task();

        assert_eq!(stack.task_state(), TaskState::Cancelled);
        assert!(matches!(
            events.try_recv(),
            Ok(StackEvent::Failed {
                kind: TaskKind::RecutFrame,
                ..
            })
        ));
    }
}
