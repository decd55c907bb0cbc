//! Sample modules
//!
//! Small functions built the way the AST lowering emits them: every local
//! lives in an alloca, every read is a load and every write a store. They
//! feed the driver and the end-to-end tests.

use scc_common::{Num, SsaError, TargetInfo, Type};

use crate::ir::{build_module, Builder, Const, Context, Linkage, MemoryOrder, Module, SyncScope};

pub const SAMPLE_NAMES: &[&str] = &[
    "arith_fold",
    "diamond",
    "loop_invariant",
    "loop_counter",
    "const_branch",
    "switch_select",
    "nested_loops",
    "escaping_alloca",
    "atomics",
];

/// Build a named sample in a fresh context
pub fn sample(name: &str, target: TargetInfo, node_limit: Option<usize>) -> Result<(Context, Module), SsaError> {
    let build: fn(&mut Context) -> Module = match name {
        "arith_fold" => arith_fold,
        "diamond" => diamond,
        "loop_invariant" => loop_invariant,
        "loop_counter" => loop_counter,
        "const_branch" => const_branch,
        "switch_select" => switch_select,
        "nested_loops" => nested_loops,
        "escaping_alloca" => escaping_alloca,
        "atomics" => atomics,
        _ => return Err(SsaError::UnknownSample { name: name.to_string() }),
    };
    build_module(target, node_limit, build)
}

fn int_fn(params: usize) -> Type {
    Type::function(Type::int(), vec![Type::int(); params], false)
}

/// `int main(void) { int x = 2 + 3 * 4; return x; }`
pub fn arith_fold(ctx: &mut Context) -> Module {
    let mut module = Module::new("arith_fold");
    let main = ctx.add_function("main", int_fn(0), Linkage::External);
    module.add_global(main);

    let mut b = Builder::new(ctx);
    b.append_block(main);
    let x = b.alloca(Type::int());
    let two = b.i32_constant(2);
    let three = b.i32_constant(3);
    let four = b.i32_constant(4);
    let product = b.mul(three, four);
    let sum = b.add(two, product);
    b.store(sum, x);
    let value = b.load(x);
    b.ret(value);
    module
}

/// `int pick(int c) { int x; if (c) x = 1; else x = 2; return x; }`
pub fn diamond(ctx: &mut Context) -> Module {
    let mut module = Module::new("diamond");
    let pick = ctx.add_function("pick", int_fn(1), Linkage::External);
    module.add_global(pick);

    let mut b = Builder::new(ctx);
    let c = b.param(pick, Type::int());
    let entry = b.append_block(pick);
    let on_true = b.ctx_mut().add_block(pick);
    let on_false = b.ctx_mut().add_block(pick);
    let join = b.ctx_mut().add_block(pick);

    b.position_at_end(entry);
    let c_slot = b.alloca(Type::int());
    let x = b.alloca(Type::int());
    b.store(c, c_slot);
    let c_value = b.load(c_slot);
    let cond = b.ne_zero(c_value);
    b.cond_jump(cond, on_true, on_false);

    b.position_at_end(on_true);
    let one = b.i32_constant(1);
    b.store(one, x);
    b.jump(join);

    b.position_at_end(on_false);
    let two = b.i32_constant(2);
    b.store(two, x);
    b.jump(join);

    b.position_at_end(join);
    let value = b.load(x);
    b.ret(value);
    module
}

/// ```c
/// int sum(int n) {
///     int x = 5, s = 0, i = 0;
///     while (i < n) { s = s + x; i = i + 1; }
///     return s;
/// }
/// ```
pub fn loop_invariant(ctx: &mut Context) -> Module {
    let mut module = Module::new("loop_invariant");
    let sum = ctx.add_function("sum", int_fn(1), Linkage::External);
    module.add_global(sum);

    let mut b = Builder::new(ctx);
    let n = b.param(sum, Type::int());
    let entry = b.append_block(sum);
    let header = b.ctx_mut().add_block(sum);
    let body = b.ctx_mut().add_block(sum);
    let exit = b.ctx_mut().add_block(sum);

    b.position_at_end(entry);
    let n_slot = b.alloca(Type::int());
    let x = b.alloca(Type::int());
    let s = b.alloca(Type::int());
    let i = b.alloca(Type::int());
    b.store(n, n_slot);
    let five = b.i32_constant(5);
    b.store(five, x);
    let zero = b.i32_constant(0);
    b.store(zero, s);
    let zero = b.i32_constant(0);
    b.store(zero, i);
    b.jump(header);

    b.position_at_end(header);
    let i_value = b.load(i);
    let n_value = b.load(n_slot);
    let cond = b.lt(i_value, n_value);
    b.cond_jump(cond, body, exit);

    b.position_at_end(body);
    let s_value = b.load(s);
    let x_value = b.load(x);
    let s_next = b.add(s_value, x_value);
    b.store(s_next, s);
    let i_value = b.load(i);
    let i_next = b.inc(i_value);
    b.store(i_next, i);
    b.jump(header);

    b.position_at_end(exit);
    let result = b.load(s);
    b.ret(result);
    module
}

/// `int count(void) { int i = 0; do i = i + 1; while (i < 10); return i; }`
pub fn loop_counter(ctx: &mut Context) -> Module {
    let mut module = Module::new("loop_counter");
    let count = ctx.add_function("count", int_fn(0), Linkage::External);
    module.add_global(count);

    let mut b = Builder::new(ctx);
    let entry = b.append_block(count);
    let body = b.ctx_mut().add_block(count);
    let exit = b.ctx_mut().add_block(count);

    b.position_at_end(entry);
    let i = b.alloca(Type::int());
    let zero = b.i32_constant(0);
    b.store(zero, i);
    b.jump(body);

    b.position_at_end(body);
    let value = b.load(i);
    let next = b.inc(value);
    b.store(next, i);
    let value = b.load(i);
    let ten = b.i32_constant(10);
    let cond = b.lt(value, ten);
    b.cond_jump(cond, body, exit);

    b.position_at_end(exit);
    let result = b.load(i);
    b.ret(result);
    module
}

/// `int choose(void) { int r; if (1) r = 10; else r = 20; return r; }`
pub fn const_branch(ctx: &mut Context) -> Module {
    let mut module = Module::new("const_branch");
    let choose = ctx.add_function("choose", int_fn(0), Linkage::External);
    module.add_global(choose);

    let mut b = Builder::new(ctx);
    let entry = b.append_block(choose);
    let on_true = b.ctx_mut().add_block(choose);
    let on_false = b.ctx_mut().add_block(choose);
    let join = b.ctx_mut().add_block(choose);

    b.position_at_end(entry);
    let r = b.alloca(Type::int());
    let one = b.i32_constant(1);
    let cond = b.ne_zero(one);
    b.cond_jump(cond, on_true, on_false);

    b.position_at_end(on_true);
    let ten = b.i32_constant(10);
    b.store(ten, r);
    b.jump(join);

    b.position_at_end(on_false);
    let twenty = b.i32_constant(20);
    b.store(twenty, r);
    b.jump(join);

    b.position_at_end(join);
    let value = b.load(r);
    b.ret(value);
    module
}

/// ```c
/// int classify(int c) {
///     int r = 7;
///     switch (c) {
///     case 1:
///     case 2: r = 100; break;
///     case 3: break;
///     default: r = 200;
///     }
///     return r;
/// }
/// ```
pub fn switch_select(ctx: &mut Context) -> Module {
    let mut module = Module::new("switch_select");
    let classify = ctx.add_function("classify", int_fn(1), Linkage::External);
    module.add_global(classify);

    let mut b = Builder::new(ctx);
    let c = b.param(classify, Type::int());
    let entry = b.append_block(classify);
    let shared = b.ctx_mut().add_block(classify);
    let default = b.ctx_mut().add_block(classify);
    let join = b.ctx_mut().add_block(classify);

    b.position_at_end(entry);
    let c_slot = b.alloca(Type::int());
    let r = b.alloca(Type::int());
    b.store(c, c_slot);
    let seven = b.i32_constant(7);
    b.store(seven, r);
    let c_value = b.load(c_slot);
    let switch = b.switch(c_value, default);
    for (case, dest) in [(1, shared), (2, shared), (3, join)] {
        let value = b.i32_constant(case);
        b.add_switch_case(switch, value, dest);
    }

    b.position_at_end(shared);
    let hundred = b.i32_constant(100);
    b.store(hundred, r);
    b.jump(join);

    b.position_at_end(default);
    let two_hundred = b.i32_constant(200);
    b.store(two_hundred, r);
    b.jump(join);

    b.position_at_end(join);
    let value = b.load(r);
    b.ret(value);
    module
}

/// ```c
/// int nest(int n) {
///     int total = 0;
///     for (int i = 0; i < n; i = i + 1)
///         for (int j = 0; j < n; j = j + 1)
///             if (i < j) total = total + 2;
///             else total = total + 1;
///     return total;
/// }
/// ```
pub fn nested_loops(ctx: &mut Context) -> Module {
    let mut module = Module::new("nested_loops");
    let nest = ctx.add_function("nest", int_fn(1), Linkage::External);
    module.add_global(nest);

    let mut b = Builder::new(ctx);
    let n = b.param(nest, Type::int());
    let entry = b.append_block(nest);
    let outer_header = b.ctx_mut().add_block(nest);
    let outer_body = b.ctx_mut().add_block(nest);
    let inner_header = b.ctx_mut().add_block(nest);
    let inner_body = b.ctx_mut().add_block(nest);
    let above = b.ctx_mut().add_block(nest);
    let below = b.ctx_mut().add_block(nest);
    let inner_latch = b.ctx_mut().add_block(nest);
    let outer_latch = b.ctx_mut().add_block(nest);
    let exit = b.ctx_mut().add_block(nest);

    b.position_at_end(entry);
    let n_slot = b.alloca(Type::int());
    let total = b.alloca(Type::int());
    let i = b.alloca(Type::int());
    let j = b.alloca(Type::int());
    b.store(n, n_slot);
    let zero = b.i32_constant(0);
    b.store(zero, total);
    let zero = b.i32_constant(0);
    b.store(zero, i);
    b.jump(outer_header);

    b.position_at_end(outer_header);
    let i_value = b.load(i);
    let n_value = b.load(n_slot);
    let cond = b.lt(i_value, n_value);
    b.cond_jump(cond, outer_body, exit);

    b.position_at_end(outer_body);
    let zero = b.i32_constant(0);
    b.store(zero, j);
    b.jump(inner_header);

    b.position_at_end(inner_header);
    let j_value = b.load(j);
    let n_value = b.load(n_slot);
    let cond = b.lt(j_value, n_value);
    b.cond_jump(cond, inner_body, outer_latch);

    b.position_at_end(inner_body);
    let i_value = b.load(i);
    let j_value = b.load(j);
    let cond = b.lt(i_value, j_value);
    b.cond_jump(cond, above, below);

    for (block, step) in [(above, 2), (below, 1)] {
        b.position_at_end(block);
        let value = b.load(total);
        let step = b.i32_constant(step);
        let next = b.add(value, step);
        b.store(next, total);
        b.jump(inner_latch);
    }

    b.position_at_end(inner_latch);
    let j_value = b.load(j);
    let j_next = b.inc(j_value);
    b.store(j_next, j);
    b.jump(inner_header);

    b.position_at_end(outer_latch);
    let i_value = b.load(i);
    let i_next = b.inc(i_value);
    b.store(i_next, i);
    b.jump(outer_header);

    b.position_at_end(exit);
    let result = b.load(total);
    b.ret(result);
    module
}

/// ```c
/// struct pair { int first; int second; };
/// void consume(int *);
/// int puts(const char *);
/// int escape(void) {
///     int x = 3;
///     struct pair p;
///     consume(&x);
///     p.second = x;
///     puts("escaped");
///     return x;
/// }
/// ```
pub fn escaping_alloca(ctx: &mut Context) -> Module {
    let mut module = Module::new("escaping_alloca");
    let pair = Type::record("pair", vec![Type::int(), Type::int()]);
    module.add_record(pair.clone());

    let consume = ctx.add_function(
        "consume",
        Type::function(Type::void(), vec![Type::int().pointer_to()], false),
        Linkage::External,
    );
    let puts = ctx.add_function(
        "puts",
        Type::function(Type::int(), vec![Type::char().pointer_to()], false),
        Linkage::External,
    );
    let escape = ctx.add_function("escape", int_fn(0), Linkage::External);
    let message = ctx.string(b"escaped\0");
    for global in [message, consume, puts, escape] {
        module.add_global(global);
    }

    let mut b = Builder::new(ctx);
    b.append_block(escape);
    let x = b.alloca(Type::int());
    let p = b.alloca(pair);
    let three = b.i32_constant(3);
    b.store(three, x);
    b.call(consume, &[x]);
    let second = b.get_field_addr(p, 1);
    let value = b.load(x);
    b.store(value, second);
    b.call(puts, &[message]);
    let result = b.load(x);
    b.ret(result);
    module
}

/// ```c
/// int counter = 0;
/// static int *counter_ref = &counter;
/// int bump(void) {
///     int old = atomic_fetch_add(&counter, 1);
///     atomic_thread_fence(memory_order_seq_cst);
///     atomic_compare_exchange(&counter, old + 1, 0);
///     atomic_exchange(&counter, old);
///     return old;
/// }
/// ```
pub fn atomics(ctx: &mut Context) -> Module {
    let mut module = Module::new("atomics");
    let bits = ctx.target().bits_of(&Type::int());
    let counter = ctx.add_global_var(
        "counter",
        Type::int(),
        Linkage::External,
        Some(Const::literal(Type::int(), Num::from_i64(bits, true, 0))),
    );
    let counter_ref = ctx.add_global_var(
        "counter_ref",
        Type::int().pointer_to(),
        Linkage::Internal,
        Some(Const::address(Type::int().pointer_to(), counter)),
    );
    let bump = ctx.add_function("bump", int_fn(0), Linkage::External);
    for global in [counter, counter_ref, bump] {
        module.add_global(global);
    }

    let mut b = Builder::new(ctx);
    b.append_block(bump);
    let one = b.i32_constant(1);
    let old = b.atomic_add(counter, one, MemoryOrder::SeqCst);
    b.fence(SyncScope::AllThreads, MemoryOrder::SeqCst);
    let expected = b.inc(old);
    let zero = b.i32_constant(0);
    b.atomic_cmpxchg(counter, expected, zero, MemoryOrder::AcqRel, MemoryOrder::Monotonic);
    b.atomic_xchg(counter, old, MemoryOrder::Release);
    b.fence(SyncScope::SingleThread, MemoryOrder::Acquire);
    b.ret(old);
    module
}
