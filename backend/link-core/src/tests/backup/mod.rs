mod archive;
mod payload;
