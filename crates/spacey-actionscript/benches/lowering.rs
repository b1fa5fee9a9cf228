//! Lowering throughput on a generated frame script.
//!
//!   cargo bench --bench lowering

use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use spacey_actionscript::{CompileOptions, NodeKind, Tree, compile};

/// `count` functions, each looping over a counter and switching on it.
fn generated_script(count: usize) -> Tree {
    let mut tree = Tree::script();
    for n in 0..count {
        let i = tree.ident("i");
        let zero = tree.int(0);
        let init = tree.assign(i, zero);
        let i = tree.ident("i");
        let limit = tree.int(100);
        let cond = tree.binary(NodeKind::Less, i, limit);
        let i = tree.ident("i");
        let iter = tree.unary(NodeKind::PostIncrement, i);

        let discriminant = tree.ident("i");
        let one = tree.int(1);
        let msg = tree.string("one");
        let trace = tree.call("trace", [msg]);
        let brk = tree.break_stmt();
        let first = tree.case(one, [trace, brk]);
        let total = tree.ident("total");
        let two = tree.int(2);
        let three = tree.int(3);
        let product = tree.binary(NodeKind::Mul, two, three);
        let add = tree.binary(NodeKind::AddAssign, total, product);
        let default = tree.default_case([add]);
        let switch = tree.switch(discriminant, [first, default]);

        let body = tree.block([switch]);
        let lp = tree.for_loop(Some(init), Some(cond), Some(iter), body);
        let function = tree.function_def(format!("f{n}"), &[], [lp]);
        let call = tree.call(format!("f{n}"), []);
        tree.push_statements([call, function]);
    }
    tree
}

fn bench_compile(c: &mut Criterion) {
    let options = CompileOptions::default();
    let tree = generated_script(200);

    c.bench_function("compile_200_functions", |b| {
        b.iter_batched(
            || tree.clone(),
            |mut tree| black_box(compile(&mut tree, &options)),
            BatchSize::SmallInput,
        )
    });

    c.bench_function("compile_and_encode_200_functions", |b| {
        b.iter_batched(
            || tree.clone(),
            |mut tree| {
                let script = compile(&mut tree, &options).expect("compiles");
                black_box(script.encode())
            },
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_compile);
criterion_main!(benches);
