//! Structural invariants checked across randomized scenarios.

use ballast2d::math::Vec2;
use ballast2d::{
    BodyDef, BodyKey, Circle, FixtureDef, Polygon, Shape, StepConf, World, WorldConf,
};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn random_pile(seed: u64, count: usize) -> (World, Vec<BodyKey>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut world = World::new(WorldConf::default().with_gravity(Vec2::new(0.0, -10.0)));
    let fixture_def = FixtureDef::default().with_density(1.0).with_friction(0.3);

    let ground = world.create_body(&BodyDef::default()).unwrap();
    world
        .create_fixture(
            ground,
            Shape::Polygon(Polygon::new_box(30.0, 1.0)),
            &fixture_def,
        )
        .unwrap();

    let mut bodies = vec![ground];
    for _ in 0..count {
        let x: f64 = rng.gen_range(-8.0..8.0);
        let y: f64 = rng.gen_range(2.0..12.0);
        let angle: f64 = rng.gen_range(-3.0..3.0);
        let body = world
            .create_body(
                &BodyDef::dynamic()
                    .with_position(Vec2::new(x, y))
                    .with_angle(angle),
            )
            .unwrap();
        if rng.gen_bool(0.5) {
            let r = rng.gen_range(0.2..0.6);
            world
                .create_fixture(body, Shape::Circle(Circle::new(r)), &fixture_def)
                .unwrap();
        } else {
            let hw = rng.gen_range(0.2..0.6);
            let hh = rng.gen_range(0.2..0.6);
            world
                .create_fixture(body, Shape::Polygon(Polygon::new_box(hw, hh)), &fixture_def)
                .unwrap();
        }
        bodies.push(body);
    }
    (world, bodies)
}

fn assert_world_invariants(world: &World, bodies: &[BodyKey]) {
    // every body's transform agrees with the end of its sweep
    for &key in bodies {
        let body = world.body(key).unwrap();
        let from_sweep = body.sweep().transform_at(1.0);
        let xf = body.transform();
        assert!(
            (xf.p - from_sweep.p).mag() < 1e-9,
            "transform out of sync with sweep"
        );
        assert!((xf.q.cos - from_sweep.q.cos).abs() < 1e-9);
        assert!((xf.q.sin - from_sweep.q.sin).abs() < 1e-9);
    }

    // fixtures keep one broad-phase proxy per shape child
    for &key in bodies {
        let body = world.body(key).unwrap();
        for &fixture_key in body.fixtures() {
            let fixture = world.fixture(fixture_key).unwrap();
            assert_eq!(fixture.proxy_count(), fixture.shape().child_count());
        }
    }

    // contacts pair distinct bodies
    for contact_key in world.contact_keys() {
        let contact = world.contact(contact_key).unwrap();
        assert_ne!(contact.body_a(), contact.body_b());
        assert_ne!(
            (contact.fixture_a(), contact.child_a()),
            (contact.fixture_b(), contact.child_b())
        );
    }

    // the broad-phase tree is structurally sound
    assert!(world.validate_broad_phase());
}

#[test]
fn random_piles_keep_invariants_across_steps() {
    for seed in [7, 99, 20260801] {
        let (mut world, bodies) = random_pile(seed, 25);
        let conf = StepConf::default();
        for step in 0..120 {
            world.step(&conf).unwrap();
            if step % 20 == 0 {
                assert_world_invariants(&world, &bodies);
            }
        }
        assert_world_invariants(&world, &bodies);

        // nothing fell through the ground
        for &key in &bodies[1..] {
            let y = world.body(key).unwrap().position().y;
            assert!(y > -1.0, "body fell through the ground to y = {}", y);
        }
    }
}

#[test]
fn warm_start_impulses_persist_across_steps() {
    let mut world = World::new(WorldConf::default().with_gravity(Vec2::new(0.0, -10.0)));
    let fixture_def = FixtureDef::default().with_density(1.0);

    let ground = world.create_body(&BodyDef::default()).unwrap();
    world
        .create_fixture(
            ground,
            Shape::Polygon(Polygon::new_box(10.0, 0.5)),
            &fixture_def,
        )
        .unwrap();
    let resting = world
        .create_body(&BodyDef::dynamic().with_position(Vec2::new(0.0, 1.0)))
        .unwrap();
    world
        .create_fixture(
            resting,
            Shape::Polygon(Polygon::new_box(0.5, 0.5)),
            &fixture_def,
        )
        .unwrap();

    let conf = StepConf::default();
    // settle into persistent contact
    for _ in 0..60 {
        world.step(&conf).unwrap();
    }

    let before: Vec<_> = world
        .contact_keys()
        .filter_map(|key| world.contact(key))
        .filter(|c| c.is_touching())
        .flat_map(|c| {
            c.manifold()
                .points()
                .iter()
                .map(|p| (p.feature, p.normal_impulse))
                .collect::<Vec<_>>()
        })
        .collect();
    assert!(!before.is_empty(), "no touching contact with impulses");
    // a resting box is held up by positive normal impulses
    assert!(before.iter().any(|(_, n)| *n > 0.0));

    world.step(&conf).unwrap();

    for key in world.contact_keys() {
        let contact = world.contact(key).unwrap();
        for point in contact.manifold().points() {
            if let Some((_, old_normal)) =
                before.iter().find(|(feature, _)| *feature == point.feature)
            {
                // same feature: the stored impulse only drifts slightly in
                // a settled stack
                assert!(
                    (point.normal_impulse - old_normal).abs() < 0.5,
                    "impulse for a persistent feature jumped from {} to {}",
                    old_normal,
                    point.normal_impulse
                );
            }
        }
    }
}

#[test]
fn sensors_report_overlap_but_do_not_collide() {
    let mut world = World::new(WorldConf::default().with_gravity(Vec2::new(0.0, -10.0)));
    let solid = FixtureDef::default().with_density(1.0);

    let ground = world.create_body(&BodyDef::default()).unwrap();
    world
        .create_fixture(
            ground,
            Shape::Polygon(Polygon::new_box(10.0, 0.5)),
            &solid,
        )
        .unwrap();
    // a sensor region above the ground
    let sensor_body = world.create_body(&BodyDef::default()).unwrap();
    world
        .create_fixture(
            sensor_body,
            Shape::Polygon(Polygon::new_box(2.0, 2.0)),
            &FixtureDef::default().sensor(),
        )
        .unwrap();

    let faller = world
        .create_body(&BodyDef::dynamic().with_position(Vec2::new(0.0, 6.0)))
        .unwrap();
    world
        .create_fixture(faller, Shape::Circle(Circle::new(0.5)), &solid)
        .unwrap();

    let conf = StepConf::default();
    let mut sensor_touched = false;
    for _ in 0..240 {
        world.step(&conf).unwrap();
        for key in world.contact_keys() {
            let c = world.contact(key).unwrap();
            let sensor_pair = world.fixture(c.fixture_a()).unwrap().is_sensor()
                || world.fixture(c.fixture_b()).unwrap().is_sensor();
            if sensor_pair && c.is_touching() {
                sensor_touched = true;
            }
        }
    }
    assert!(sensor_touched, "sensor overlap was never reported");
    // the sensor exerted no force: the ball rests on the ground below it
    let y = world.body(faller).unwrap().position().y;
    assert!((y - 1.0).abs() < 0.1, "ball at y = {}", y);
}
