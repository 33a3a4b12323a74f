pub mod booking;
pub mod domain;
pub mod ports;
pub mod schedule;

pub use booking::{BookingRequest, BookingService, WalkInRequest};
pub use domain::{
    Address, AdminDashboard, Appointment, AppointmentFilter, AppointmentType, Article,
    AuthSession, BookingMode, Credentials, Doctor, DoctorDashboard, DoctorProfileUpdate,
    NewAppointment, NewArticle, NewDoctor, NewUser, Principal, ProfileUpdate, QueueOccupancy, User,
};
pub use ports::{Clock, DatabaseService, PortError, PortResult, SystemClock};
pub use schedule::{ClinicPolicy, DayQueue, DaySlots, QueueWindow, Slot, Token};
