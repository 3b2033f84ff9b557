//! Island building: partitioning the body/contact/joint graph into
//! independently solvable components.

use super::body::Body;
use super::contact::Contact;
use super::joint::Joint;
use super::{BodyKey, ContactKey, JointKey};
use thunderdome::Arena;

/// One connected component of the constraint graph.
///
/// Non-speedable (static) bodies terminate the flood, so they can appear in
/// several islands per step; they are read but never written by the solver.
#[derive(Clone, Debug, Default)]
pub(crate) struct Island {
    pub bodies: Vec<BodyKey>,
    pub contacts: Vec<ContactKey>,
    pub joints: Vec<JointKey>,
}

/// Flood-fill the constraint graph from `seed`, marking everything reached.
///
/// The caller is responsible for seeding only awake, enabled, speedable
/// bodies, and for clearing the `islanded` flags between steps.
pub(crate) fn build_island(
    seed: BodyKey,
    bodies: &mut Arena<Body>,
    contacts: &mut Arena<Contact>,
    joints: &mut Arena<Joint>,
    is_sensor_contact: impl Fn(&Contact) -> bool,
    stack: &mut Vec<BodyKey>,
) -> Island {
    let mut island = Island::default();

    stack.clear();
    stack.push(seed);
    bodies[seed.0].islanded = true;

    while let Some(body_key) = stack.pop() {
        island.bodies.push(body_key);

        // static bodies bound the island; don't search past them
        if !bodies[body_key.0].is_speedable() {
            continue;
        }
        // everything connected to a moving body participates in the solve
        bodies[body_key.0].set_awake();

        for i in 0..bodies[body_key.0].contacts.len() {
            let contact_key = bodies[body_key.0].contacts[i];
            let contact = &contacts[contact_key.0];
            if contact.islanded
                || !contact.enabled
                || !contact.touching
                || is_sensor_contact(contact)
            {
                continue;
            }
            let other = if contact.body_a == body_key {
                contact.body_b
            } else {
                contact.body_a
            };
            contacts[contact_key.0].islanded = true;
            island.contacts.push(contact_key);

            if !bodies[other.0].islanded {
                bodies[other.0].islanded = true;
                stack.push(other);
            }
        }

        for i in 0..bodies[body_key.0].joints.len() {
            let joint_key = bodies[body_key.0].joints[i];
            let joint = &joints[joint_key.0];
            if joint.islanded {
                continue;
            }
            let other = if joint.body_a == body_key {
                joint.body_b
            } else {
                joint.body_a
            };
            if !bodies[other.0].enabled {
                continue;
            }
            joints[joint_key.0].islanded = true;
            island.joints.push(joint_key);

            if !bodies[other.0].islanded {
                bodies[other.0].islanded = true;
                stack.push(other);
            }
        }
    }

    // free the static members for reuse by the next island
    for &body_key in &island.bodies {
        if !bodies[body_key.0].is_speedable() {
            bodies[body_key.0].islanded = false;
        }
    }

    island
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamics::body::BodyDef;
    use crate::dynamics::FixtureKey;
    use crate::math::Vec2;

    fn link_contact(
        bodies: &mut Arena<Body>,
        contacts: &mut Arena<Contact>,
        a: BodyKey,
        b: BodyKey,
        touching: bool,
    ) -> ContactKey {
        // fixture keys are irrelevant for graph structure; reuse body indices
        let contact = Contact::new(
            FixtureKey(a.0),
            0,
            a,
            FixtureKey(b.0),
            0,
            b,
            (0, 1),
            0.2,
            0.2,
            0.0,
            0.0,
            false,
            false,
        );
        let key = ContactKey(contacts.insert(contact));
        contacts[key.0].touching = touching;
        bodies[a.0].contacts.push(key);
        bodies[b.0].contacts.push(key);
        key
    }

    #[test]
    fn chain_of_touching_bodies_is_one_island() {
        let mut bodies = Arena::new();
        let mut contacts = Arena::new();
        let mut joints: Arena<Joint> = Arena::new();

        let keys: Vec<BodyKey> = (0..4)
            .map(|i| {
                BodyKey(bodies.insert(Body::new(
                    &BodyDef::dynamic().with_position(Vec2::new(i as f64, 0.0)),
                )))
            })
            .collect();
        for pair in keys.windows(2) {
            link_contact(&mut bodies, &mut contacts, pair[0], pair[1], true);
        }

        let mut stack = Vec::new();
        let island = build_island(
            keys[0],
            &mut bodies,
            &mut contacts,
            &mut joints,
            |_| false,
            &mut stack,
        );
        assert_eq!(island.bodies.len(), 4);
        assert_eq!(island.contacts.len(), 3);
    }

    #[test]
    fn static_bodies_bound_islands_and_stay_reusable() {
        let mut bodies = Arena::new();
        let mut contacts = Arena::new();
        let mut joints: Arena<Joint> = Arena::new();

        // dynamic A - static ground - dynamic B: two separate islands
        let a = BodyKey(bodies.insert(Body::new(&BodyDef::dynamic())));
        let ground = BodyKey(bodies.insert(Body::new(&BodyDef::default())));
        let b = BodyKey(bodies.insert(Body::new(&BodyDef::dynamic())));
        link_contact(&mut bodies, &mut contacts, a, ground, true);
        link_contact(&mut bodies, &mut contacts, ground, b, true);

        let mut stack = Vec::new();
        let island1 = build_island(
            a,
            &mut bodies,
            &mut contacts,
            &mut joints,
            |_| false,
            &mut stack,
        );
        assert_eq!(island1.bodies.len(), 2);
        assert!(!bodies[ground.0].islanded, "static body must be reusable");

        let island2 = build_island(
            b,
            &mut bodies,
            &mut contacts,
            &mut joints,
            |_| false,
            &mut stack,
        );
        assert_eq!(island2.bodies.len(), 2);
        assert!(island2.bodies.contains(&ground));
        // no speedable body appears in both islands
        for key in &island1.bodies {
            if bodies[key.0].is_speedable() {
                assert!(!island2.bodies.contains(key));
            }
        }
    }

    #[test]
    fn non_touching_and_sensor_contacts_are_skipped() {
        let mut bodies = Arena::new();
        let mut contacts = Arena::new();
        let mut joints: Arena<Joint> = Arena::new();

        let a = BodyKey(bodies.insert(Body::new(&BodyDef::dynamic())));
        let b = BodyKey(bodies.insert(Body::new(&BodyDef::dynamic())));
        let c = BodyKey(bodies.insert(Body::new(&BodyDef::dynamic())));
        link_contact(&mut bodies, &mut contacts, a, b, false);
        let sensor = link_contact(&mut bodies, &mut contacts, a, c, true);

        let mut stack = Vec::new();
        let island = build_island(
            a,
            &mut bodies,
            &mut contacts,
            &mut joints,
            |contact| {
                // treat the a-c contact as a sensor pair
                contact.body_b == c
            },
            &mut stack,
        );
        assert_eq!(island.bodies, vec![a]);
        assert!(island.contacts.is_empty());
        assert!(!contacts[sensor.0].islanded);
    }
}
