mod audit;
mod claims;
mod cycles;
mod end_to_end;
mod integrity;
mod replay;
mod taint;
mod tree;
