use std::cell::RefCell;
use std::rc::Rc;

use anyhow::Result;
use lk_tracker::config::{Config, Item};
use lk_tracker::detector::Detector;
use lk_tracker::feature::PointState;
use lk_tracker::image::Image;
use lk_tracker::my_types::{PointId, Vector2d};
use lk_tracker::optical_flow::{FlowEstimate, MotionEstimator};
use lk_tracker::region::Region;
use lk_tracker::tracker::Session;

/// Replays scripted answers and records every batch it receives
struct ScriptedEstimator {
    /// per call: (new location, valid) for each prior point
    script: Vec<Vec<(Vector2d, bool)>>,
    batches: Rc<RefCell<Vec<Vec<Vector2d>>>>,
}

impl MotionEstimator for ScriptedEstimator {
    fn estimate(&mut self, _: &Image, _: &Image, prior: &[Vector2d]) -> Result<FlowEstimate> {
        let call = self.batches.borrow().len();
        self.batches.borrow_mut().push(prior.to_vec());
        let answers = &self.script[call];
        assert_eq!(answers.len(), prior.len(), "unexpected batch size on call {call}");
        let mut estimate = FlowEstimate::with_capacity(prior.len());
        for (point, valid) in answers {
            estimate.push(*point, *valid, 0.);
        }
        Ok(estimate)
    }
}

fn scripted_session(
    config: &Config,
    script: Vec<Vec<(Vector2d, bool)>>,
) -> (Session, Rc<RefCell<Vec<Vec<Vector2d>>>>) {
    let batches = Rc::new(RefCell::new(vec![]));
    let estimator = ScriptedEstimator {
        script,
        batches: batches.clone(),
    };
    let session = Session::new(config, Box::new(estimator), Box::new(Detector::new()));
    (session, batches)
}

fn frame() -> Image {
    Image::filled(200, 200, 0)
}

fn p(x: f64, y: f64) -> Vector2d {
    Vector2d::new(x, y)
}

#[test]
fn test_ids_stable_across_ticks() {
    let script = vec![
        vec![(p(1., 1.), true), (p(2., 2.), true), (p(3., 3.), true)],
        vec![(p(4., 4.), true), (p(5., 5.), true), (p(6., 6.), true)],
        vec![(p(7., 7.), true), (p(8., 8.), true), (p(9., 9.), true)],
    ];
    let (mut session, _) = scripted_session(&Config::default(), script);
    session.seed_points([p(0., 0.), p(10., 10.), p(20., 20.)]);

    for _ in 0..4 {
        let tick = session.process(frame()).unwrap();
        let ids: Vec<PointId> = tick.points.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![PointId(0), PointId(1), PointId(2)]);
        assert!(tick.points.iter().all(|p| p.state() == PointState::Active));
    }
    assert_eq!(session.points()[2].location(), Some(p(9., 9.)));
}

#[test]
fn test_lost_is_terminal() {
    // the first point flips valid -> invalid -> valid, the second stays valid
    let script = vec![
        vec![(p(1., 0.), true), (p(11., 0.), true)],
        vec![(p(2., 0.), false), (p(12., 0.), true)],
        vec![(p(13., 0.), true)],
    ];
    let (mut session, batches) = scripted_session(&Config::default(), script);
    session.seed_points([p(0., 0.), p(10., 0.)]);

    session.process(frame()).unwrap();
    assert!(session.process(frame()).unwrap().lost.is_empty());
    assert_eq!(session.process(frame()).unwrap().lost, vec![PointId(0)]);
    let tick = session.process(frame()).unwrap();
    assert!(tick.lost.is_empty());
    assert_eq!(tick.points[0].state(), PointState::Lost);
    assert_eq!(tick.points[0].location(), None);
    assert_eq!(tick.points[1].location(), Some(p(13., 0.)));

    // once lost, the point never reaches the estimator again
    let batches = batches.borrow();
    assert_eq!(batches[2], vec![p(12., 0.)]);
}

#[test]
fn test_batch_shape() {
    let script = vec![
        vec![(p(0., 0.), true), (p(1., 1.), false), (p(2., 2.), false)],
        vec![(p(0., 0.), false)],
    ];
    let (mut session, batches) = scripted_session(&Config::default(), script);
    session.seed_points([p(0., 0.), p(1., 1.), p(2., 2.)]);

    for _ in 0..5 {
        session.process(frame()).unwrap();
    }
    let sizes: Vec<usize> = batches.borrow().iter().map(|b| b.len()).collect();
    assert_eq!(sizes, vec![3, 1]);
    assert_eq!(session.active_count(), 0);
    assert_eq!(session.lost_count(), 3);
}

#[test]
fn test_empty_session_never_estimates() {
    let (mut session, batches) = scripted_session(&Config::default(), vec![]);
    for _ in 0..3 {
        let tick = session.process(frame()).unwrap();
        assert!(!tick.estimated);
        assert!(tick.points.is_empty());
    }
    assert!(batches.borrow().is_empty());
}

#[test]
fn test_first_tick_is_a_noop() {
    let (mut session, batches) = scripted_session(&Config::default(), vec![]);
    session.seed_points([p(5., 5.), p(6., 6.)]);
    let tick = session.process(frame()).unwrap();
    assert!(!tick.estimated);
    assert!(tick.lost.is_empty());
    assert!(tick.points.iter().all(|p| p.state() == PointState::Active));
    assert_eq!(session.points()[0].location(), Some(p(5., 5.)));
    assert!(batches.borrow().is_empty());
    assert!(session.previous_frame().is_some());
}

#[test]
fn test_single_point_end_to_end() {
    let config = Config {
        item: Item::Pixel,
        ..Config::default()
    };
    let script = vec![vec![(p(102., 101.), true)], vec![(p(103., 101.), false)]];
    let (mut session, batches) = scripted_session(&config, script);

    let region = session.on_pointer_down(100., 100.).unwrap();
    assert!(region.is_degenerate());
    assert_eq!(session.points()[0].id, PointId(0));

    let mut notifications = vec![];
    for tick_number in 1..=3 {
        let tick = session.process(frame()).unwrap();
        for id in &tick.lost {
            notifications.push((tick_number, *id));
        }
        if tick_number == 2 {
            assert_eq!(tick.points[0].location(), Some(p(102., 101.)));
        }
    }

    assert_eq!(batches.borrow()[0], vec![p(100., 100.)]);
    assert_eq!(batches.borrow()[1], vec![p(102., 101.)]);
    assert_eq!(notifications, vec![(3, PointId(0))]);
    let points = session.points();
    assert_eq!(points.len(), 1);
    assert_eq!(points[0].id, PointId(0));
    assert_eq!(points[0].state(), PointState::Lost);
}

#[test]
fn test_zone_mesh_commit_replaces_points() {
    let config = Config {
        item: Item::Zone,
        mesh: true,
        grid_size: 3,
        ..Config::default()
    };
    let (mut session, _) = scripted_session(&config, vec![]);
    session.commit(Region::new(p(0., 0.), p(20., 20.)));
    assert_eq!(session.points().len(), 9);
    assert_eq!(session.region(), Some(Region::new(p(0., 0.), p(20., 20.))));

    // click-click: the second press commits and reseeds
    assert!(session.on_pointer_down(50., 50.).is_none());
    assert_eq!(session.points().len(), 9);
    session.on_pointer_down(60., 60.).unwrap();
    let ids: Vec<usize> = session.points().iter().map(|p| p.id.0).collect();
    assert_eq!(ids, (9..18).collect::<Vec<_>>());
    assert_eq!(session.points()[0].location(), Some(p(50., 50.)));
}
