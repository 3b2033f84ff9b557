//! Joint behavior under stepping.

use ballast2d::dynamics::joint::{
    DistanceJoint, FrictionJoint, GearJoint, MotorJoint, MouseJoint, PrismaticJoint, PulleyJoint,
    RevoluteJoint, RopeJoint, WeldJoint, WheelJoint,
};
use ballast2d::math::{UnitVec2, Vec2};
use ballast2d::{
    BodyDef, BodyKey, Circle, FixtureDef, JointDef, JointKind, Polygon, Shape, StepConf, World,
    WorldConf,
};

fn approx(a: f64, b: f64, tol: f64) -> bool {
    (a - b).abs() < tol
}

fn dynamic_ball(world: &mut World, at: Vec2) -> BodyKey {
    let body = world
        .create_body(&BodyDef::dynamic().with_position(at))
        .unwrap();
    world
        .create_fixture(
            body,
            Shape::Circle(Circle::new(0.5)),
            &FixtureDef::default().with_density(1.0),
        )
        .unwrap();
    body
}

#[test]
fn revolute_pendulum_keeps_its_arm_length() {
    let mut world = World::new(WorldConf::default().with_gravity(Vec2::new(0.0, -10.0)));
    let pivot_body = world.create_body(&BodyDef::default()).unwrap();
    let bob = dynamic_ball(&mut world, Vec2::new(2.0, 0.0));

    // pin the bob 2 m from the static pivot at the origin
    let joint = RevoluteJoint::new(Vec2::zero(), Vec2::new(-2.0, 0.0), 0.0);
    world
        .create_joint(JointDef::new(pivot_body, bob, JointKind::Revolute(joint)))
        .unwrap();

    let conf = StepConf::default();
    for _ in 0..120 {
        world.step(&conf).unwrap();
        let pos = world.body(bob).unwrap().position();
        let arm = pos.mag();
        assert!(approx(arm, 2.0, 0.05), "arm length drifted to {}", arm);
    }
    // it should actually be swinging
    assert!(world.body(bob).unwrap().position().y < -0.5);
}

#[test]
fn distance_joint_holds_rest_length() {
    let mut world = World::new(WorldConf::default().with_gravity(Vec2::new(0.0, -10.0)));
    let anchor = world.create_body(&BodyDef::default()).unwrap();
    let hanging = dynamic_ball(&mut world, Vec2::new(0.0, -3.0));

    let joint = DistanceJoint::new(Vec2::zero(), Vec2::zero(), 3.0);
    world
        .create_joint(JointDef::new(anchor, hanging, JointKind::Distance(joint)))
        .unwrap();

    let conf = StepConf::default();
    for _ in 0..120 {
        world.step(&conf).unwrap();
    }
    let len = world.body(hanging).unwrap().position().mag();
    assert!(approx(len, 3.0, 0.05), "length {}", len);
}

#[test]
fn prismatic_joint_constrains_to_axis() {
    let mut world = World::new(WorldConf::default().with_gravity(Vec2::new(0.0, -10.0)));
    let ground = world.create_body(&BodyDef::default()).unwrap();
    let slider = dynamic_ball(&mut world, Vec2::new(0.0, 0.0));

    // horizontal slide axis: gravity must not pull the body off it
    let joint = PrismaticJoint::new(Vec2::zero(), Vec2::zero(), UnitVec2::X)
        .with_motor(2.0, 100.0);
    world
        .create_joint(JointDef::new(ground, slider, JointKind::Prismatic(joint)))
        .unwrap();

    let conf = StepConf::default();
    for _ in 0..90 {
        world.step(&conf).unwrap();
    }
    let pos = world.body(slider).unwrap().position();
    assert!(pos.y.abs() < 0.01, "body fell off the axis: y = {}", pos.y);
    // the motor drags it along +x at ~2 m/s
    assert!(pos.x > 1.0, "motor did not drive the slider: x = {}", pos.x);
}

#[test]
fn rope_joint_caps_distance() {
    let mut world = World::new(WorldConf::default().with_gravity(Vec2::new(0.0, -10.0)));
    let anchor = world.create_body(&BodyDef::default()).unwrap();
    let swinging = dynamic_ball(&mut world, Vec2::new(1.0, 0.0));

    let joint = RopeJoint::new(Vec2::zero(), Vec2::zero(), 4.0);
    world
        .create_joint(JointDef::new(anchor, swinging, JointKind::Rope(joint)))
        .unwrap();

    let conf = StepConf::default();
    for _ in 0..240 {
        world.step(&conf).unwrap();
        let len = world.body(swinging).unwrap().position().mag();
        assert!(len < 4.1, "rope stretched to {}", len);
    }
}

#[test]
fn weld_joint_locks_bodies_together() {
    let mut world = World::new(WorldConf::default().with_gravity(Vec2::new(0.0, -10.0)));
    let fixture_def = FixtureDef::default().with_density(1.0);

    let ground = world.create_body(&BodyDef::default()).unwrap();
    world
        .create_fixture(ground, Shape::Polygon(Polygon::new_box(10.0, 0.5)), &fixture_def)
        .unwrap();

    let a = world
        .create_body(&BodyDef::dynamic().with_position(Vec2::new(0.0, 3.0)))
        .unwrap();
    world
        .create_fixture(a, Shape::Polygon(Polygon::new_box(0.5, 0.5)), &fixture_def)
        .unwrap();
    let b = world
        .create_body(&BodyDef::dynamic().with_position(Vec2::new(1.0, 3.0)))
        .unwrap();
    world
        .create_fixture(b, Shape::Polygon(Polygon::new_box(0.5, 0.5)), &fixture_def)
        .unwrap();

    let joint = WeldJoint::new(Vec2::new(0.5, 0.0), Vec2::new(-0.5, 0.0), 0.0);
    world
        .create_joint(JointDef::new(a, b, JointKind::Weld(joint)))
        .unwrap();

    let conf = StepConf::default();
    for _ in 0..180 {
        world.step(&conf).unwrap();
    }
    let pa = world.body(a).unwrap().position();
    let pb = world.body(b).unwrap().position();
    assert!(approx(pb.x - pa.x, 1.0, 0.05));
    assert!(approx(pb.y - pa.y, 0.0, 0.05));
}

#[test]
fn mouse_joint_drags_body_to_target() {
    let mut world = World::new(WorldConf::default().with_gravity(Vec2::zero()));
    let ground = world.create_body(&BodyDef::default()).unwrap();
    let dragged = dynamic_ball(&mut world, Vec2::zero());

    let joint = MouseJoint::new(Vec2::zero(), Vec2::new(3.0, 2.0), 1000.0);
    world
        .create_joint(JointDef::new(ground, dragged, JointKind::Mouse(joint)))
        .unwrap();

    let conf = StepConf::default();
    for _ in 0..240 {
        world.step(&conf).unwrap();
    }
    let pos = world.body(dragged).unwrap().position();
    assert!(approx(pos.x, 3.0, 0.1) && approx(pos.y, 2.0, 0.1), "at {:?}", pos);
}

#[test]
fn motorized_revolute_spins_a_wheel() {
    let mut world = World::new(WorldConf::default().with_gravity(Vec2::zero()));
    let ground = world.create_body(&BodyDef::default()).unwrap();
    let wheel = dynamic_ball(&mut world, Vec2::zero());

    let joint = RevoluteJoint::new(Vec2::zero(), Vec2::zero(), 0.0).with_motor(5.0, 100.0);
    world
        .create_joint(JointDef::new(ground, wheel, JointKind::Revolute(joint)))
        .unwrap();

    let conf = StepConf::default();
    for _ in 0..60 {
        world.step(&conf).unwrap();
    }
    let omega = world.body(wheel).unwrap().angular_velocity();
    assert!(approx(omega, 5.0, 0.1), "motor speed {}", omega);
}

#[test]
fn gear_couples_two_ground_revolutes() {
    let mut world = World::new(WorldConf::default().with_gravity(Vec2::zero()));
    let ground = world.create_body(&BodyDef::default()).unwrap();

    let wheel_a = dynamic_ball(&mut world, Vec2::new(-2.0, 0.0));
    let wheel_b = dynamic_ball(&mut world, Vec2::new(2.0, 0.0));

    let rev_a = world
        .create_joint(JointDef::new(
            ground,
            wheel_a,
            JointKind::Revolute(RevoluteJoint::new(Vec2::new(-2.0, 0.0), Vec2::zero(), 0.0)),
        ))
        .unwrap();
    let rev_b = world
        .create_joint(JointDef::new(
            ground,
            wheel_b,
            JointKind::Revolute(
                RevoluteJoint::new(Vec2::new(2.0, 0.0), Vec2::zero(), 0.0)
                    .with_motor(4.0, 1000.0),
            ),
        ))
        .unwrap();

    // wheel A must counter-rotate at half speed
    world
        .create_joint(JointDef::new(
            wheel_a,
            wheel_b,
            JointKind::Gear(GearJoint::new(rev_a, rev_b, 2.0)),
        ))
        .unwrap();

    let conf = StepConf::default();
    for _ in 0..120 {
        world.step(&conf).unwrap();
    }
    let omega_a = world.body(wheel_a).unwrap().angular_velocity();
    let omega_b = world.body(wheel_b).unwrap().angular_velocity();
    assert!(
        (omega_a + 2.0 * omega_b).abs() < 0.2,
        "gear ratio violated: {} vs {}",
        omega_a,
        omega_b
    );
}

#[test]
fn friction_joint_damps_motion_to_a_stop() {
    let mut world = World::new(WorldConf::default().with_gravity(Vec2::zero()));
    let ground = world.create_body(&BodyDef::default()).unwrap();
    let sliding = world
        .create_body(
            &BodyDef::dynamic()
                .with_position(Vec2::zero())
                .with_linear_velocity(Vec2::new(4.0, 0.0)),
        )
        .unwrap();
    world
        .create_fixture(
            sliding,
            Shape::Circle(Circle::new(0.5)),
            &FixtureDef::default().with_density(1.0),
        )
        .unwrap();

    let joint = FrictionJoint::new(Vec2::zero(), Vec2::zero(), 5.0, 5.0);
    world
        .create_joint(JointDef::new(ground, sliding, JointKind::Friction(joint)))
        .unwrap();

    let conf = StepConf::default();
    for _ in 0..180 {
        world.step(&conf).unwrap();
    }
    let v = world.body(sliding).unwrap().linear_velocity();
    assert!(v.mag() < 0.05, "still sliding at {:?}", v);
}

#[test]
fn motor_joint_tracks_its_offset() {
    let mut world = World::new(WorldConf::default().with_gravity(Vec2::zero()));
    let ground = world.create_body(&BodyDef::default()).unwrap();
    let follower = dynamic_ball(&mut world, Vec2::zero());

    let joint = MotorJoint::new(Vec2::new(2.0, -1.0), 0.0, 50.0, 50.0);
    world
        .create_joint(JointDef::new(ground, follower, JointKind::Motor(joint)))
        .unwrap();

    let conf = StepConf::default();
    for _ in 0..300 {
        world.step(&conf).unwrap();
    }
    let pos = world.body(follower).unwrap().position();
    assert!(
        approx(pos.x, 2.0, 0.1) && approx(pos.y, -1.0, 0.1),
        "follower at {:?}",
        pos
    );
}

#[test]
fn wheel_joint_suspension_holds_the_chassis() {
    let mut world = World::new(WorldConf::default().with_gravity(Vec2::new(0.0, -10.0)));
    let ground = world.create_body(&BodyDef::default()).unwrap();
    let wheel = dynamic_ball(&mut world, Vec2::new(0.0, -1.0));

    // vertical suspension axis anchored to the static frame
    let joint = WheelJoint::new(Vec2::zero(), Vec2::zero(), UnitVec2::Y).with_spring(4.0, 0.7);
    world
        .create_joint(JointDef::new(ground, wheel, JointKind::Wheel(joint)))
        .unwrap();

    let conf = StepConf::default();
    for _ in 0..300 {
        world.step(&conf).unwrap();
    }
    let pos = world.body(wheel).unwrap().position();
    // off-axis motion is locked; the spring supports the weight near rest
    assert!(pos.x.abs() < 0.01, "wheel slid off its axis: x = {}", pos.x);
    assert!(pos.y > -3.0, "suspension collapsed to y = {}", pos.y);
    assert!(world.body(wheel).unwrap().linear_velocity().mag() < 0.2);
}

#[test]
fn pulley_trades_heights_at_its_ratio() {
    let mut world = World::new(WorldConf::default().with_gravity(Vec2::new(0.0, -10.0)));

    let left = dynamic_ball(&mut world, Vec2::new(-2.0, 0.0));
    let right = world
        .create_body(&BodyDef::dynamic().with_position(Vec2::new(2.0, 0.0)))
        .unwrap();
    // the heavier side sinks and lifts the lighter one
    world
        .create_fixture(
            right,
            Shape::Circle(Circle::new(0.5)),
            &FixtureDef::default().with_density(4.0),
        )
        .unwrap();

    let joint = PulleyJoint::new(
        Vec2::new(-2.0, 4.0),
        Vec2::new(2.0, 4.0),
        Vec2::zero(),
        Vec2::zero(),
        4.0,
        4.0,
        1.0,
    );
    world
        .create_joint(JointDef::new(left, right, JointKind::Pulley(joint)))
        .unwrap();

    let conf = StepConf::default();
    for _ in 0..120 {
        world.step(&conf).unwrap();
    }
    let y_left = world.body(left).unwrap().position().y;
    let y_right = world.body(right).unwrap().position().y;
    assert!(y_right < -0.1, "heavy side did not sink: {}", y_right);
    assert!(y_left > 0.1, "light side did not rise: {}", y_left);
    // rope length is conserved at the 1:1 ratio
    let len_left = (Vec2::new(-2.0, 4.0) - world.body(left).unwrap().position()).mag();
    let len_right = (Vec2::new(2.0, 4.0) - world.body(right).unwrap().position()).mag();
    assert!(approx(len_left + len_right, 8.0, 0.1));
}

#[test]
fn joint_destruction_wakes_bodies_and_unlinks() {
    let mut world = World::new(WorldConf::default().with_gravity(Vec2::zero()));
    let a = dynamic_ball(&mut world, Vec2::zero());
    let b = dynamic_ball(&mut world, Vec2::new(2.0, 0.0));

    let key = world
        .create_joint(JointDef::new(
            a,
            b,
            JointKind::Distance(DistanceJoint::new(Vec2::zero(), Vec2::zero(), 2.0)),
        ))
        .unwrap();
    assert_eq!(world.joint_count(), 1);
    assert_eq!(world.body(a).unwrap().joints().len(), 1);

    world.destroy_joint(key).unwrap();
    assert_eq!(world.joint_count(), 0);
    assert!(world.body(a).unwrap().joints().is_empty());
    assert!(world.body(b).unwrap().joints().is_empty());
    assert!(world.joint(key).is_none());
}
