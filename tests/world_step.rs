//! Stepping behavior of the world as a whole.

use ballast2d::dynamics::{ContactKey, ListenerResponse};
use ballast2d::math::Vec2;
use ballast2d::{
    BodyDef, Circle, ContactListener, FixtureDef, Polygon, Shape, StepConf, World, WorldConf,
    WorldError,
};

use std::cell::{Cell, RefCell};
use std::rc::Rc;

fn approx(a: f64, b: f64, tol: f64) -> bool {
    (a - b).abs() < tol
}

#[test]
fn free_fall_under_gravity() {
    let mut world = World::new(WorldConf::default().with_gravity(Vec2::new(0.0, -10.0)));
    let body = world
        .create_body(&BodyDef::dynamic().with_position(Vec2::new(0.0, 1.0)))
        .unwrap();

    let conf = StepConf::default().with_dt(0.01);
    world.step(&conf).unwrap();

    let b = world.body(body).unwrap();
    assert!(approx(b.linear_velocity().y, -0.1, 1e-12));
    // semi-implicit Euler: the new velocity moves the body
    assert!(approx(b.position().y, 0.999, 1e-12));
    assert!(approx(b.position().x, 0.0, 1e-12));
}

#[test]
fn zero_dt_step_does_not_move_anything() {
    let mut world = World::new(WorldConf::default().with_gravity(Vec2::new(0.0, -10.0)));
    let body = world
        .create_body(&BodyDef::dynamic().with_position(Vec2::new(0.0, 1.0)))
        .unwrap();
    world.step(&StepConf::default().with_dt(0.0)).unwrap();
    let b = world.body(body).unwrap();
    assert_eq!(b.position().y, 1.0);
    assert!(b.linear_velocity().y == 0.0);
}

struct TouchWatcher {
    touched: Rc<Cell<bool>>,
}

impl ContactListener for TouchWatcher {
    fn begin_contact(&mut self, _world: &mut World, _contact: ContactKey) {
        self.touched.set(true);
    }
}

#[test]
fn head_on_collision_of_unit_circles() {
    let mut world = World::new(WorldConf::default().with_gravity(Vec2::zero()));
    let fixture_def = FixtureDef::default().with_density(1.0);

    let a = world
        .create_body(
            &BodyDef::dynamic()
                .with_position(Vec2::new(-11.0, 0.0))
                .with_linear_velocity(Vec2::new(10.0, 0.0)),
        )
        .unwrap();
    world
        .create_fixture(a, Shape::Circle(Circle::new(1.0)), &fixture_def)
        .unwrap();
    let b = world
        .create_body(
            &BodyDef::dynamic()
                .with_position(Vec2::new(11.0, 0.0))
                .with_linear_velocity(Vec2::new(-10.0, 0.0)),
        )
        .unwrap();
    world
        .create_fixture(b, Shape::Circle(Circle::new(1.0)), &fixture_def)
        .unwrap();

    let touched = Rc::new(Cell::new(false));
    world.set_listener(Box::new(TouchWatcher {
        touched: touched.clone(),
    }));

    let conf = StepConf::default().with_dt(0.01);
    let mut steps = 0;
    while !touched.get() {
        world.step(&conf).unwrap();
        steps += 1;
        assert!(steps < 200, "circles never touched");
    }

    // closing 20 m of surface gap at 20 m/s: roughly a second
    let elapsed = steps as f64 * 0.01;
    assert!(approx(elapsed, 1.01, 0.03), "elapsed {}", elapsed);

    let pos_a = world.body(a).unwrap().position();
    let pos_b = world.body(b).unwrap().position();
    assert!(pos_a.x < 0.0 && pos_b.x > 0.0, "bodies passed through");
    assert!(approx(pos_a.x, -pos_b.x, 1e-6), "asymmetric positions");
}

struct ReentrantMutator {
    seen: Rc<RefCell<Option<Result<(), WorldError>>>>,
}

impl ContactListener for ReentrantMutator {
    fn begin_contact(&mut self, world: &mut World, _contact: ContactKey) {
        let result = world.create_body(&BodyDef::dynamic()).map(|_| ());
        *self.seen.borrow_mut() = Some(result);
    }
}

#[test]
fn mutation_from_listener_is_rejected_and_harmless() {
    let mut world = World::default();
    let fixture_def = FixtureDef::default().with_density(1.0);

    let ground = world.create_body(&BodyDef::default()).unwrap();
    world
        .create_fixture(ground, Shape::Polygon(Polygon::new_box(10.0, 1.0)), &fixture_def)
        .unwrap();
    let faller = world
        .create_body(&BodyDef::dynamic().with_position(Vec2::new(0.0, 1.5)))
        .unwrap();
    world
        .create_fixture(faller, Shape::Polygon(Polygon::new_box(0.5, 0.5)), &fixture_def)
        .unwrap();

    let seen = Rc::new(RefCell::new(None));
    world.set_listener(Box::new(ReentrantMutator { seen: seen.clone() }));

    let bodies_before = world.body_count();
    let conf = StepConf::default();
    for _ in 0..30 {
        world.step(&conf).unwrap();
    }

    let result = seen.borrow().clone();
    assert_eq!(
        result,
        Some(Err(WorldError::Locked)),
        "listener mutation should be refused"
    );
    assert_eq!(world.body_count(), bodies_before, "state was changed");
    assert!(!world.is_locked());
}

struct PreSolveVeto;

impl ContactListener for PreSolveVeto {
    fn pre_solve(
        &mut self,
        _world: &mut World,
        _contact: ContactKey,
        _old: &ballast2d::Manifold,
    ) -> ListenerResponse {
        ListenerResponse::Disable
    }
}

#[test]
fn pre_solve_veto_disables_collision_response() {
    let mut world = World::new(WorldConf::default().with_gravity(Vec2::new(0.0, -10.0)));
    let fixture_def = FixtureDef::default().with_density(1.0);

    let ground = world.create_body(&BodyDef::default()).unwrap();
    world
        .create_fixture(ground, Shape::Polygon(Polygon::new_box(10.0, 0.5)), &fixture_def)
        .unwrap();
    let faller = world
        .create_body(&BodyDef::dynamic().with_position(Vec2::new(0.0, 2.0)))
        .unwrap();
    world
        .create_fixture(faller, Shape::Polygon(Polygon::new_box(0.5, 0.5)), &fixture_def)
        .unwrap();

    world.set_listener(Box::new(PreSolveVeto));

    // no TOI: the TOI sub-stepper re-enables contacts to do its job
    let conf = StepConf {
        do_toi: false,
        ..StepConf::default()
    };
    for _ in 0..120 {
        world.step(&conf).unwrap();
    }
    // with response disabled the box falls straight through the ground
    assert!(world.body(faller).unwrap().position().y < -1.0);
}

#[test]
fn resting_box_falls_asleep() {
    let mut world = World::new(WorldConf::default().with_gravity(Vec2::new(0.0, -10.0)));
    let fixture_def = FixtureDef::default().with_density(1.0);

    let ground = world.create_body(&BodyDef::default()).unwrap();
    world
        .create_fixture(ground, Shape::Polygon(Polygon::new_box(10.0, 0.5)), &fixture_def)
        .unwrap();
    let resting = world
        .create_body(&BodyDef::dynamic().with_position(Vec2::new(0.0, 1.0001)))
        .unwrap();
    world
        .create_fixture(resting, Shape::Polygon(Polygon::new_box(0.5, 0.5)), &fixture_def)
        .unwrap();

    let conf = StepConf::default();
    for _ in 0..180 {
        world.step(&conf).unwrap();
    }
    let body = world.body(resting).unwrap();
    assert!(!body.is_awake(), "body should have gone to sleep");
    assert!(body.velocity().is_zero());
    // sleeping preserves position
    assert!(body.position().y > 0.9);

    // an impulse wakes it back up
    world
        .apply_linear_impulse(resting, Vec2::new(0.0, 5.0), Vec2::new(0.0, 1.0))
        .unwrap();
    assert!(world.body(resting).unwrap().is_awake());
}

#[test]
fn capacity_and_validity_checks() {
    let mut world = World::default();
    // NaN position is refused
    let bad = BodyDef::dynamic().with_position(Vec2::new(f64::NAN, 0.0));
    assert_eq!(world.create_body(&bad), Err(WorldError::InvalidArgument));

    // a degenerate polygon has no valid shape, so fixture creation fails
    let body = world.create_body(&BodyDef::dynamic()).unwrap();
    assert!(Polygon::new(&[Vec2::zero(), Vec2::new(1.0, 0.0), Vec2::new(2.0, 0.0)]).is_none());

    // vertex radius outside world limits is refused
    let tiny = Circle::new(1e-9);
    assert_eq!(
        world
            .create_fixture(body, Shape::Circle(tiny), &FixtureDef::default())
            .err(),
        Some(WorldError::InvalidArgument)
    );
}

#[test]
fn stacked_boxes_settle() {
    let mut world = World::new(WorldConf::default().with_gravity(Vec2::new(0.0, -10.0)));
    let fixture_def = FixtureDef::default().with_density(1.0).with_friction(0.4);

    let ground = world.create_body(&BodyDef::default()).unwrap();
    world
        .create_fixture(ground, Shape::Polygon(Polygon::new_box(20.0, 0.5)), &fixture_def)
        .unwrap();

    let mut boxes = Vec::new();
    for i in 0..4 {
        let body = world
            .create_body(
                &BodyDef::dynamic().with_position(Vec2::new(0.0, 1.1 + 1.05 * i as f64)),
            )
            .unwrap();
        world
            .create_fixture(body, Shape::Polygon(Polygon::new_box(0.5, 0.5)), &fixture_def)
            .unwrap();
        boxes.push(body);
    }

    let conf = StepConf::default();
    for _ in 0..300 {
        world.step(&conf).unwrap();
    }

    // stack order preserved, everything at rest near its slot
    for (i, &key) in boxes.iter().enumerate() {
        let body = world.body(key).unwrap();
        let expected_y = 1.0 + i as f64;
        assert!(
            approx(body.position().y, expected_y, 0.1),
            "box {} at y = {}",
            i,
            body.position().y
        );
        assert!(body.linear_velocity().mag() < 0.1);
    }
}
