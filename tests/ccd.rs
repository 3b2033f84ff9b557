//! Continuous collision detection: fast bodies must not tunnel.

use ballast2d::math::Vec2;
use ballast2d::{BodyDef, Circle, FixtureDef, Polygon, Shape, StepConf, World, WorldConf};

fn bullet_world(do_toi: bool) -> (World, ballast2d::BodyKey) {
    let mut world = World::new(WorldConf::default().with_gravity(Vec2::zero()));
    let fixture_def = FixtureDef::default().with_density(1.0);

    // a thin static wall at the origin
    let wall = world.create_body(&BodyDef::default()).unwrap();
    world
        .create_fixture(wall, Shape::Polygon(Polygon::new_box(0.05, 5.0)), &fixture_def)
        .unwrap();

    // a small, very fast projectile heading at it
    let bullet = world
        .create_body(
            &BodyDef::dynamic()
                .with_position(Vec2::new(-5.0, 0.0))
                .with_linear_velocity(Vec2::new(1000.0, 0.0))
                .with_bullet(true),
        )
        .unwrap();
    world
        .create_fixture(bullet, Shape::Circle(Circle::new(0.1)), &fixture_def)
        .unwrap();

    let conf = StepConf {
        do_toi,
        // one step moves the bullet ~16 m, far past the wall
        ..StepConf::default().with_dt(1.0 / 60.0)
    };
    for _ in 0..4 {
        world.step(&conf).unwrap();
    }
    (world, bullet)
}

#[test]
fn bullet_stops_at_thin_wall_with_toi() {
    let (world, bullet) = bullet_world(true);
    let x = world.body(bullet).unwrap().position().x;
    assert!(x < 0.0, "bullet tunneled to x = {}", x);
}

#[test]
fn bullet_tunnels_without_toi() {
    let (world, bullet) = bullet_world(false);
    let x = world.body(bullet).unwrap().position().x;
    assert!(x > 1.0, "expected tunneling, bullet at x = {}", x);
}

#[test]
fn toi_stats_record_substeps() {
    let mut world = World::new(WorldConf::default().with_gravity(Vec2::zero()));
    let fixture_def = FixtureDef::default().with_density(1.0);

    let wall = world.create_body(&BodyDef::default()).unwrap();
    world
        .create_fixture(wall, Shape::Polygon(Polygon::new_box(0.05, 5.0)), &fixture_def)
        .unwrap();
    let bullet = world
        .create_body(
            &BodyDef::dynamic()
                .with_position(Vec2::new(-5.0, 0.0))
                .with_linear_velocity(Vec2::new(1000.0, 0.0))
                .with_bullet(true),
        )
        .unwrap();
    world
        .create_fixture(bullet, Shape::Circle(Circle::new(0.1)), &fixture_def)
        .unwrap();

    let conf = StepConf::default().with_dt(1.0 / 60.0);
    let mut toi_islands = 0;
    for _ in 0..4 {
        let stats = world.step(&conf).unwrap();
        toi_islands += stats.toi.islands_found;
    }
    assert!(toi_islands > 0, "no TOI events were solved");
}

#[test]
fn two_bullets_head_on() {
    let mut world = World::new(WorldConf::default().with_gravity(Vec2::zero()));
    let fixture_def = FixtureDef::default().with_density(1.0).with_restitution(1.0);

    let a = world
        .create_body(
            &BodyDef::dynamic()
                .with_position(Vec2::new(-10.0, 0.0))
                .with_linear_velocity(Vec2::new(500.0, 0.0))
                .with_bullet(true),
        )
        .unwrap();
    world
        .create_fixture(a, Shape::Circle(Circle::new(0.2)), &fixture_def)
        .unwrap();
    let b = world
        .create_body(
            &BodyDef::dynamic()
                .with_position(Vec2::new(10.0, 0.0))
                .with_linear_velocity(Vec2::new(-500.0, 0.0))
                .with_bullet(true),
        )
        .unwrap();
    world
        .create_fixture(b, Shape::Circle(Circle::new(0.2)), &fixture_def)
        .unwrap();

    let conf = StepConf::default().with_dt(1.0 / 30.0);
    for _ in 0..4 {
        world.step(&conf).unwrap();
    }
    // the impact happened instead of the bodies passing through each other
    let xa = world.body(a).unwrap().position().x;
    let xb = world.body(b).unwrap().position().x;
    assert!(xa < xb, "bullets swapped sides: {} vs {}", xa, xb);
}
