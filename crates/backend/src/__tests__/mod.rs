
mod cycle;
mod scheduler;
