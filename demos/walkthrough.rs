use std::{env, ptr::NonNull};

use brkalloc::{Config, FreeListAllocator};
use log::info;

/// Prints the current program break using `sbrk(0)`.
fn print_program_break(label: &str) {
  println!(
    "[{}] PID = {}, program break (sbrk(0)) = {:#x}",
    label,
    std::process::id(),
    unsafe { libc::sbrk(0) } as usize,
  );
}

fn print_free_list(allocator: &FreeListAllocator) {
  print!("{}", allocator.free_list_report());
  println!("{}", allocator.stats());
}

fn allocate(
  allocator: &mut FreeListAllocator,
  step: &str,
  size: usize,
) -> Option<NonNull<u8>> {
  match allocator.allocate(size) {
    Ok(ptr) => {
      println!("\n[{step}] allocate({size}) -> {ptr:p}");
      Some(ptr)
    }
    Err(error) => {
      println!("\n[{step}] allocate({size}) failed: {error}");
      None
    }
  }
}

fn release(
  allocator: &mut FreeListAllocator,
  step: &str,
  ptr: NonNull<u8>,
) {
  match allocator.release(ptr.as_ptr()) {
    Ok(()) => println!("\n[{step}] release({ptr:p}) -> ok"),
    Err(error) => println!("\n[{step}] release({ptr:p}) failed: {error}"),
  }
}

fn main() {
  if env::var_os("RUST_LOG").is_none() {
    unsafe { env::set_var("RUST_LOG", "debug") };
  }
  pretty_env_logger::init();

  let grow_chunk = env::var("BRKALLOC_GROW_CHUNK")
    .ok()
    .and_then(|value| value.parse().ok())
    .unwrap_or(0);

  let mut allocator = FreeListAllocator::with_config(
    brkalloc::Sbrk::new(),
    Config::default().with_grow_chunk(grow_chunk),
  );

  print_program_break("start");

  // --------------------------------------------------------------------
  // 1) Three allocations, each grows the heap (unless a grow chunk is set).
  // --------------------------------------------------------------------
  let Some(p10) = allocate(&mut allocator, "1", 10) else { return };
  let Some(p50) = allocate(&mut allocator, "1", 50) else { return };
  let Some(p70) = allocate(&mut allocator, "1", 70) else { return };
  print_free_list(&allocator);
  print_program_break("after growth");

  // --------------------------------------------------------------------
  // 2) 16 and then 32 more bytes, reusing grow-chunk leftovers if any.
  // --------------------------------------------------------------------
  let Some(p16) = allocate(&mut allocator, "2", 16) else { return };
  print_free_list(&allocator);

  let Some(p32) = allocate(&mut allocator, "2", 32) else { return };
  print_free_list(&allocator);

  // --------------------------------------------------------------------
  // 3) Release the 16-byte region: it lands in the free list, merged with
  //    any free neighbor.
  // --------------------------------------------------------------------
  release(&mut allocator, "3", p16);
  print_free_list(&allocator);

  // --------------------------------------------------------------------
  // 4) Releasing the same address twice is reported, not fatal.
  // --------------------------------------------------------------------
  release(&mut allocator, "4", p16);

  // --------------------------------------------------------------------
  // 5) Free the 50-byte region and ask for 16: first fit reuses it and
  //    leaves a smaller free remainder behind.
  // --------------------------------------------------------------------
  release(&mut allocator, "5", p50);
  let Some(small) = allocate(&mut allocator, "5", 16) else { return };
  println!(
    "[5] reused the freed 50-byte region? {}",
    if small == p50 { "yes" } else { "no" }
  );
  print_free_list(&allocator);

  // --------------------------------------------------------------------
  // 6) Zero-size requests still get a releasable address.
  // --------------------------------------------------------------------
  if let Some(zero) = allocate(&mut allocator, "6", 0) {
    release(&mut allocator, "6", zero);
  }

  // --------------------------------------------------------------------
  // 7) Release everything: the free list collapses into as few regions as
  //    the heap layout allows.
  // --------------------------------------------------------------------
  for ptr in [p10, p70, p32, small] {
    release(&mut allocator, "7", ptr);
  }
  print_free_list(&allocator);

  match allocator.check() {
    Ok(()) => info!("heap invariants hold"),
    Err(error) => info!("heap check failed: {error}"),
  }

  print_program_break("end");
  println!("\n[8] End of walkthrough. The heap never shrinks; the OS reclaims it at exit.");
}
