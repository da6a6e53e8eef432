use criterion::{black_box, criterion_group, criterion_main, Criterion};
use slotvm::{
    lookup, CodeContext, Heap, HeapCreateInfo, ObjectId, ObjectLiteral, Scheduler, SendType,
    SlotType, SpecialObjects, VMCreateInfo, Value,
};

const CHAIN_DEPTH: usize = 64;

/// A chain of `CHAIN_DEPTH` objects, the slot lives at the far end.
fn deep_chain() -> (Heap, SpecialObjects, ObjectId) {
    let mut heap = Heap::new(HeapCreateInfo::default());
    let specials = SpecialObjects::new(&mut heap).expect("bootstrap");

    let mut current = heap.new_object().expect("object");
    heap.add_slot(current, "answer", Value::from_fixnum(42));
    for _ in 0..CHAIN_DEPTH {
        let child = heap.new_object().expect("object");
        heap.add_parent(child, "parent", current.into());
        current = child;
    }
    (heap, specials, current)
}

fn bench_lookup(c: &mut Criterion) {
    let (heap, specials, leaf) = deep_chain();

    c.bench_function("slot_lookup_cached", |b| {
        b.iter(|| lookup::slot_lookup(&heap, &specials, black_box(leaf), "answer"))
    });
    c.bench_function("slot_lookup_uncached", |b| {
        b.iter(|| lookup::uncached_slot_lookup(&heap, &specials, black_box(leaf), "answer"))
    });
}

/// Installs `target = (| add = (|| 1 + 1) |)` on the universe, then sends
/// `target add` `sends` times.
fn send_program(sends: usize) -> CodeContext {
    let mut body = CodeContext::new();
    body.push_int(1).expect("literal");
    body.push_int(1).expect("literal");
    body.push_str("+").expect("literal");
    body.send(SendType::Binary, 1);

    let mut code = CodeContext::new();
    code.push_self();
    code.push_str("target").expect("literal");
    code.push_object(ObjectLiteral::plain()).expect("literal");
    code.push_str("add").expect("literal");
    code.push_object(ObjectLiteral::method(body, &[])).expect("literal");
    code.add_slot(SlotType::Normal);
    code.add_slot(SlotType::Normal);

    for _ in 0..sends {
        code.pop();
        code.push_self();
        code.push_str("target").expect("literal");
        code.send(SendType::Unary, 0);
        code.push_str("add").expect("literal");
        code.send(SendType::Unary, 0);
    }
    code
}

fn bench_interpret(c: &mut Criterion) {
    let program = send_program(200);
    c.bench_function("interpret_200_sends", |b| {
        b.iter(|| {
            let mut scheduler = Scheduler::new(VMCreateInfo::default()).expect("bootstrap");
            let handle = scheduler.add_process(program.clone());
            scheduler.interpret();
            black_box(handle.result())
        })
    });
}

criterion_group!(benches, bench_lookup, bench_interpret);
criterion_main!(benches);
