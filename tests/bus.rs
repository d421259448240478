use dataview_client::{bus::EventBus, counter::Counter, Error};
use std::{cell::RefCell, rc::Rc};

#[test]
fn calls_every_listener_in_order() {
	let bus = EventBus::<u32>::new();
	let log = Rc::new(RefCell::new(Vec::new()));
	for name in &["a", "b", "c"] {
		let log = Rc::clone(&log);
		bus.add(move |n: &u32| log.borrow_mut().push(format!("{}{}", name, n))).unwrap();
	}

	bus.call(&1);
	assert_eq!(*log.borrow(), vec!["a1", "b1", "c1"]);
	assert_eq!(bus.len(), 3);
}

#[test]
fn removal() {
	let bus = EventBus::<()>::new();
	let first = bus.add(|_| ()).unwrap();
	let second = bus.add(|_| ()).unwrap();
	assert_ne!(first, second);

	assert!(bus.remove(first));
	assert!(!bus.remove(first));
	assert_eq!(bus.len(), 1);
	assert!(bus.remove(second));
	assert!(bus.is_empty());
}

#[test]
fn listeners_may_unsubscribe_themselves() {
	let bus = Rc::new(EventBus::<()>::new());
	let calls = Rc::new(RefCell::new(0));
	let subscription = Rc::new(RefCell::new(None));

	let handle = bus
		.add({
			let bus = Rc::downgrade(&bus);
			let calls = Rc::clone(&calls);
			let subscription = Rc::clone(&subscription);
			move |_| {
				*calls.borrow_mut() += 1;
				if let (Some(bus), Some(subscription)) = (bus.upgrade(), *subscription.borrow()) {
					assert!(bus.remove(subscription));
				}
			}
		})
		.unwrap();
	*subscription.borrow_mut() = Some(handle);

	bus.call(&());
	bus.call(&());
	assert_eq!(*calls.borrow(), 1);
	assert!(bus.is_empty());
}

#[test]
fn listeners_added_during_dispatch_start_with_the_next_event() {
	let bus = Rc::new(EventBus::<()>::new());
	let late_calls = Rc::new(RefCell::new(0));
	bus.add({
		let bus = Rc::downgrade(&bus);
		let late_calls = Rc::clone(&late_calls);
		move |_| {
			if let Some(bus) = bus.upgrade() {
				let late_calls = Rc::clone(&late_calls);
				bus.add(move |_| *late_calls.borrow_mut() += 1).unwrap();
			}
		}
	})
	.unwrap();

	bus.call(&());
	assert_eq!(*late_calls.borrow(), 0);
	bus.call(&());
	assert_eq!(*late_calls.borrow(), 1);
}

#[test]
fn counter_starts_at_one_and_saturates() {
	let mut counter = Counter::<u8>::new();
	assert_eq!(counter.current(), 0);
	assert_eq!(counter.next().unwrap(), 1);
	assert_eq!(counter.next().unwrap(), 2);

	for _ in 2..u8::MAX {
		counter.next().unwrap();
	}
	assert_eq!(counter.current(), u8::MAX);
	assert!(matches!(counter.next(), Err(Error::CounterSaturated)));
	assert_eq!(counter.current(), u8::MAX);
}
