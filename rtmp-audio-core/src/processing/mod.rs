pub mod sample_fifo;
